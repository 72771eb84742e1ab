use std::error::Error;
use std::path::PathBuf;

use aetherus_lineage::LedgerConfig;
use aetherus_lineage::export::read_json;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        return Err(format!("usage: {} <ledger.json> <seq_no>", args[0]).into());
    }
    let ledger_path = args[1].parse::<PathBuf>()?;
    let seq_no = args[2].parse::<u32>()?;

    let ledger = read_json(&ledger_path, &LedgerConfig::default())?;
    for uid in ledger.chain(seq_no)? {
        if uid.is_root() {
            println!("{:>10}  Root", uid.seq_no);
        } else {
            println!("{:>10}  {}  {:?}", uid.seq_no, uid, uid.event_type());
        }
    }
    Ok(())
}
