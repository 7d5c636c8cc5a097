//! Demand-loading, write-back page cache backed by a single file.
//!
//! Page buffers live in a fixed-capacity `heapless::Vec` sized to
//! `TABLE_MAX_PAGES`; running past that bound is a fatal condition rather
//! than something the pager grows past.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use heapless::Vec as HVec;
use tracing::{debug, trace};

use super::btree::{PageBuf, PAGE_SIZE, TABLE_MAX_PAGES};
use crate::err;
use crate::errors::Error;

pub struct Pager {
    file: File,
    /// `None` until `get_page` demand-loads or creates it.
    pages: HVec<Option<PageBuf>, TABLE_MAX_PAGES>,
    /// Number of pages that exist, whether resident or not.
    num_pages: u32,
}

impl Pager {
    /// Opens (creating if absent) the file at `path`. Fails with
    /// `Error::Fatal` if the file length isn't a whole number of pages.
    pub fn open(path: &Path) -> Result<Pager, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_length = file.metadata()?.len() as usize;
        if file_length % PAGE_SIZE != 0 {
            return Err(err!(
                Fatal,
                "Db file is not a whole number of pages. Corrupt file."
            ));
        }
        let num_pages = (file_length / PAGE_SIZE) as u32;

        let mut pages = HVec::new();
        for _ in 0..TABLE_MAX_PAGES {
            let _ = pages.push(None);
        }

        debug!(num_pages, "opened pager");
        Ok(Pager {
            file,
            pages,
            num_pages,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Returns the resident buffer for `page_num`, demand-loading from
    /// disk or zero-initializing a fresh page as needed.
    pub fn get_page(&mut self, page_num: u32) -> Result<&mut PageBuf, Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                Fatal,
                "Tried to fetch page number out of bounds. {} >= {}",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        if self.pages[page_num as usize].is_none() {
            let mut buf = [0u8; PAGE_SIZE];
            if page_num < self.num_pages {
                trace!(page_num, "reading page from disk");
                self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(&mut buf)?;
            }
            self.pages[page_num as usize] = Some(buf);
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// The next page number to hand out. Allocation is append-only;
    /// pages are never recycled (no deletion in this design).
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Writes the resident buffer for `page_num` back to disk.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        let buf = self.pages[page_num as usize]
            .as_ref()
            .ok_or_else(|| err!(Fatal, "Tried to flush a non-resident page {page_num}"))?;
        self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Flushes every resident page. Called once, at `.exit`.
    pub fn close(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            if self.pages[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        debug!(num_pages = self.num_pages, "flushed all resident pages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::{initialize_leaf_node, leaf_node_num_cells, set_leaf_node_num_cells};

    #[test]
    fn fresh_file_has_no_pages() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pager = Pager::open(file.path()).unwrap();
        assert_eq!(pager.num_pages(), 0);
    }

    #[test]
    fn get_page_zero_inits_and_bumps_num_pages() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path()).unwrap();
        let page = pager.get_page(0).unwrap();
        initialize_leaf_node(page);
        assert_eq!(pager.num_pages(), 1);
        assert_eq!(pager.unused_page_num(), 1);
    }

    #[test]
    fn flush_then_reopen_round_trips() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(file.path()).unwrap();
            let page = pager.get_page(0).unwrap();
            initialize_leaf_node(page);
            set_leaf_node_num_cells(page, 3);
            pager.close().unwrap();
        }
        {
            let mut pager = Pager::open(file.path()).unwrap();
            assert_eq!(pager.num_pages(), 1);
            let page = pager.get_page(0).unwrap();
            assert_eq!(leaf_node_num_cells(page), 3);
        }
    }

    #[test]
    fn flushing_non_resident_page_is_fatal() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path()).unwrap();
        let err = pager.flush(5).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn page_out_of_bounds_is_fatal() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path()).unwrap();
        let err = pager.get_page(TABLE_MAX_PAGES as u32).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn corrupt_file_length_is_fatal() {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        let err = Pager::open(file.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}
