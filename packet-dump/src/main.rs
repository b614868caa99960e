//! This tool decodes a raw AMF request or response envelope from a file and
//! prints the packet, either as debug output or as a JSON document for easy
//! previewing and for building test fixtures.

#![deny(missing_docs, clippy::missing_docs_in_private_items)]

use amf_gateway::packet::read::PacketDecoder;
use clap::{Arg, ArgAction, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("AMF envelope dumper")
        .version("1.0")
        .arg(
            Arg::new("INPUT")
                .help("Path to a file holding one raw AMF envelope")
                .required(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the packet as JSON instead of debug output"),
        )
        .get_matches();

    let file_name = matches.get_one::<String>("INPUT").expect("INPUT is required");
    let data = std::fs::read(file_name)?;

    let mut decoder = PacketDecoder::default();
    match decoder.parse(&data) {
        Ok(packet) => {
            if matches.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&packet)?);
            } else {
                println!("{packet:#?}");
            }
        }
        Err(e) => {
            eprintln!("Couldn't decode the envelope");
            eprintln!("Error = {e:?}");
        }
    }

    Ok(())
}
