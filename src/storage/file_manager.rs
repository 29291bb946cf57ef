use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::debug;
use parking_lot::Mutex;

use crate::common::{Result, StoneDBError};
use crate::storage::{BlockId, Page};

/// Maps (filename, block number) to fixed-size byte blocks on backing
/// files. One handle per filename stays open for the process lifetime;
/// all file operations are mutually exclusive.
#[derive(Debug)]
pub struct FileManager {
    db_directory: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    pub fn new(db_directory: impl Into<PathBuf>, block_size: usize) -> Result<Self> {
        let db_directory = db_directory.into();
        let is_new = !db_directory.exists();

        if is_new {
            fs::create_dir_all(&db_directory).map_err(|e| io_err(&db_directory, e))?;
        }

        // Remove any leftover temporary tables from a previous run.
        let entries = fs::read_dir(&db_directory).map_err(|e| io_err(&db_directory, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&db_directory, e))?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with("temp") {
                debug!("removing leftover temp file {:?}", name);
                fs::remove_file(entry.path()).map_err(|e| io_err(&db_directory, e))?;
            }
        }

        Ok(Self {
            db_directory,
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    /// True iff the database directory did not exist before this manager
    /// created it. The startup code uses this to decide whether to recover.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Read the block's contents into the page. Reading past the current
    /// end of the file leaves the page zeroed.
    pub fn read(&self, blk: &BlockId, page: &mut Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = self.get_file(&mut files, blk.file_name())?;
        let offset = blk.number() as u64 * self.block_size as u64;

        page.contents_mut().fill(0);
        let len = file
            .metadata()
            .map_err(|e| io_file_err(blk.file_name(), e))?
            .len();
        if offset >= len {
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| io_file_err(blk.file_name(), e))?;
        file.read_exact(page.contents_mut())
            .map_err(|e| io_file_err(blk.file_name(), e))?;
        Ok(())
    }

    /// Write the page's contents to the block, synchronously. Commit
    /// durability (FORCE) depends on writes not lingering in OS caches.
    pub fn write(&self, blk: &BlockId, page: &Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = self.get_file(&mut files, blk.file_name())?;
        let offset = blk.number() as u64 * self.block_size as u64;

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| io_file_err(blk.file_name(), e))?;
        file.write_all(page.contents())
            .map_err(|e| io_file_err(blk.file_name(), e))?;
        file.sync_all().map_err(|e| io_file_err(blk.file_name(), e))?;
        Ok(())
    }

    /// Grow the file by one zero-filled block and return its id.
    pub fn append(&self, filename: &str) -> Result<BlockId> {
        let mut files = self.open_files.lock();
        let file = self.get_file(&mut files, filename)?;

        let len = file.metadata().map_err(|e| io_file_err(filename, e))?.len();
        let new_blk_num = (len / self.block_size as u64) as i32;
        let blk = BlockId::new(filename, new_blk_num);

        let zeros = vec![0u8; self.block_size];
        file.seek(SeekFrom::Start(new_blk_num as u64 * self.block_size as u64))
            .map_err(|e| io_file_err(filename, e))?;
        file.write_all(&zeros).map_err(|e| io_file_err(filename, e))?;
        file.sync_all().map_err(|e| io_file_err(filename, e))?;
        Ok(blk)
    }

    /// Number of blocks in the file.
    pub fn length(&self, filename: &str) -> Result<i32> {
        let mut files = self.open_files.lock();
        let file = self.get_file(&mut files, filename)?;
        let len = file.metadata().map_err(|e| io_file_err(filename, e))?.len();
        Ok((len / self.block_size as u64) as i32)
    }

    fn get_file<'a>(
        &self,
        files: &'a mut HashMap<String, File>,
        filename: &str,
    ) -> Result<&'a mut File> {
        match files.entry(filename.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let path = self.db_directory.join(filename);
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)
                    .map_err(|e| io_file_err(filename, e))?;
                Ok(v.insert(file))
            }
        }
    }
}

fn io_err(path: &std::path::Path, source: std::io::Error) -> StoneDBError {
    StoneDBError::Io {
        file: path.to_string_lossy().into_owned(),
        source,
    }
}

fn io_file_err(filename: &str, source: std::io::Error) -> StoneDBError {
    StoneDBError::Io {
        file: filename.to_string(),
        source,
    }
}
