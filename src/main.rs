use env_logger::Builder;
use log::{info, LevelFilter};
use std::path::Path;

use stonedb::StoneDB;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::new().filter_level(LevelFilter::Info).init();

    info!("StoneDB storage kernel demo");

    let db = StoneDB::open(Path::new("demo_db"))?;

    let mut tx = db.new_tx()?;
    let blk = tx.append("demo_table")?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 0, 42, true)?;
    tx.set_string(&blk, 40, "hello, stonedb", true)?;
    info!("wrote to {}", blk);
    tx.unpin(&blk)?;
    tx.commit()?;

    let mut tx = db.new_tx()?;
    let blk = stonedb::BlockId::new("demo_table", 0);
    tx.pin(&blk)?;
    info!("read back: {} / {:?}", tx.get_int(&blk, 0)?, tx.get_string(&blk, 40)?);
    tx.unpin(&blk)?;
    tx.commit()?;

    Ok(())
}
