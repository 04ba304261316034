use std::io::BufRead;

use pdflib as pdf;
use pdf::doc::Document;

fn main() -> Result<(), pdf::Error> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "-v");

    stderrlog::new()
        .verbosity(if verbose { log::Level::Trace } else { log::Level::Warn })
        .init()
        .unwrap();

    let Some(fname) = args.iter().skip(1).find(|a| !a.starts_with('-')) else {
        println!("Usage: {} [-v] filename", args[0]);
        return Ok(());
    };

    let doc = Document::open_file(fname)?;
    println!("PDF version {}.{}", doc.version().0, doc.version().1);
    println!("{} object(s) in index", doc.num_objects());
    println!("trailer: {}", pdf::Object::Dict(doc.trailer().clone()));

    let mut curr_obj = doc.catalog().clone();
    println!("{curr_obj}");

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split(' ').collect();
        match parts[..] {
            ["stream"] => {
                let Some(stm) = curr_obj.as_stream() else {
                    log::error!("current object is not a stream");
                    continue;
                };
                let mut data = doc.read_stream_data(stm)?;
                let mut cmd = std::process::Command::new("less")
                    .stdin(std::process::Stdio::piped())
                    .arg("-R")
                    .spawn()?;
                let mut stdin = cmd.stdin.take().unwrap();
                std::io::copy(&mut data, &mut stdin)?;
                drop(stdin);
                cmd.wait()?;
            },
            [p1, p2] => match (p1.parse::<pdf::ObjNum>(), p2.parse::<pdf::ObjGen>()) {
                (Ok(num), Ok(_gen)) => match doc.find_object_by_number(num) {
                    Some(Ok(obj)) => { curr_obj = obj; println!("{curr_obj}"); },
                    Some(Err(err)) => log::error!("{err}"),
                    None => log::error!("no object numbered {num}")
                },
                _ => log::error!("expected \"num gen\" or \"stream\"")
            },
            _ => log::error!("expected \"num gen\" or \"stream\"")
        }
    }

    doc.close();
    Ok(())
}
