//! The single table: a pager plus the page number of the current root.

use std::path::Path;

use tracing::{debug, info, warn};

use super::btree::{self, PageBuf};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::Row;
use crate::err;
use crate::errors::Error;

pub struct Table {
    pub(crate) pager: Pager,
    pub root_page_num: u32,
}

impl Table {
    /// Opens `path`, initializing page 0 as an empty leaf (the root) if
    /// the file is new.
    pub fn open(path: &Path) -> Result<Table, Error> {
        let mut pager = Pager::open(path)?;
        if pager.num_pages() == 0 {
            let root = pager.get_page(0)?;
            btree::initialize_leaf_node(root);
            btree::set_is_root(root, true);
            info!("initialized new database file");
        }
        Ok(Table {
            pager,
            root_page_num: 0,
        })
    }

    /// Flushes every resident page. Must be called before the table is
    /// dropped, or unflushed writes are lost.
    pub fn close(&mut self) -> Result<(), Error> {
        self.pager.close()
    }

    /// Raw access to a page's node bytes, for introspection and tests.
    pub fn page(&mut self, page_num: u32) -> Result<&PageBuf, Error> {
        Ok(self.pager.get_page(page_num)?)
    }

    /// Inserts `row`, fatally failing if `.insert` cannot locate the leaf
    /// (shouldn't happen) and returning `Error::Duplicate` if `row.id`
    /// already exists.
    pub fn insert(&mut self, row: &Row) -> Result<(), Error> {
        let key = row.id;
        let (page_num, cell_num) = {
            let cursor = Cursor::find(self, key)?;
            (cursor.page_num, cursor.cell_num)
        };

        let node = self.pager.get_page(page_num)?;
        let num_cells = btree::leaf_node_num_cells(node);
        if cell_num < num_cells && btree::leaf_node_key(node, cell_num) == key {
            return Err(Error::Duplicate);
        }

        if num_cells as usize >= btree::LEAF_NODE_MAX_CELLS {
            self.leaf_node_split_and_insert(page_num, cell_num, row)
        } else {
            leaf_node_insert(self.pager.get_page(page_num)?, cell_num, row);
            Ok(())
        }
    }

    /// Yields every row in key order by walking the leaf sibling chain
    /// from the leftmost leaf.
    pub fn select(&mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::start(self)?;
        while !cursor.end_of_table {
            let value = &cursor.value_bytes()[..];
            rows.push(Row::deserialize(value));
            cursor.advance()?;
        }
        Ok(rows)
    }

    /// Splits the full leaf at `page_num` into itself and a freshly
    /// allocated right sibling, inserting `row` at `cell_num` into
    /// whichever half it belongs in, then fixes up the parent.
    fn leaf_node_split_and_insert(
        &mut self,
        page_num: u32,
        cell_num: u32,
        row: &Row,
    ) -> Result<(), Error> {
        let new_page_num = self.pager.unused_page_num();

        let old_max_key;
        let old_next_leaf;
        let old_parent;
        let was_root;
        {
            let old = self.pager.get_page(page_num)?;
            old_max_key = btree::node_max_key(old);
            // Capture before the new leaf is spliced in, or this reads
            // the value we are about to overwrite.
            old_next_leaf = btree::leaf_node_next_leaf(old);
            old_parent = btree::parent_page_num(old);
            was_root = btree::is_root(old);
        }

        {
            let new_leaf = self.pager.get_page(new_page_num)?;
            btree::initialize_leaf_node(new_leaf);
        }

        // Distribute LEAF_NODE_MAX_CELLS + 1 cells (the existing ones plus
        // the new row) across old (left) and new (right), preserving
        // order, without ever materializing more than one extra cell.
        let total_cells = btree::LEAF_NODE_MAX_CELLS as u32 + 1;
        for i in (0..total_cells).rev() {
            let dest_is_new = i >= btree::LEAF_NODE_LEFT_SPLIT_COUNT as u32;
            let index_within_node = i % btree::LEAF_NODE_LEFT_SPLIT_COUNT as u32;

            if i == cell_num {
                let mut buf = [0u8; 4 + super::row::ROW_SIZE];
                buf[0..4].copy_from_slice(&row.id.to_le_bytes());
                row.serialize(&mut buf[4..]);
                self.place_cell(dest_is_new, new_page_num, page_num, index_within_node, &buf);
            } else {
                let source_index = if i > cell_num { i - 1 } else { i };
                self.move_cell(page_num, source_index, dest_is_new, new_page_num, index_within_node);
            }
        }

        {
            let old = self.pager.get_page(page_num)?;
            btree::set_leaf_node_num_cells(old, btree::LEAF_NODE_LEFT_SPLIT_COUNT as u32);
            btree::set_leaf_node_next_leaf(old, new_page_num);
        }
        {
            let new_leaf = self.pager.get_page(new_page_num)?;
            btree::set_leaf_node_num_cells(
                new_leaf,
                (total_cells - btree::LEAF_NODE_LEFT_SPLIT_COUNT as u32) as u32,
            );
            btree::set_leaf_node_next_leaf(new_leaf, old_next_leaf);
            btree::set_parent_page_num(new_leaf, old_parent);
        }

        debug!(page_num, new_page_num, "split leaf");

        if was_root {
            self.create_new_root(new_page_num)
        } else {
            let parent = old_parent;
            // old's own max key shrank after giving cells to the new right
            // sibling; the parent's routing key for it must shrink too.
            let old_new_max_key = {
                let old = self.pager.get_page(page_num)?;
                btree::node_max_key(old)
            };
            {
                let parent_node = self.pager.get_page(parent)?;
                btree::update_internal_node_key(parent_node, old_max_key, old_new_max_key);
            }
            self.internal_node_insert(parent, new_page_num)
        }
    }

    /// Writes a freshly-serialized `(key, value)` cell into whichever
    /// half of the split it belongs to.
    fn place_cell(
        &mut self,
        dest_is_new: bool,
        new_page_num: u32,
        old_page_num: u32,
        index_within_node: u32,
        cell: &[u8],
    ) {
        let dest_page = if dest_is_new { new_page_num } else { old_page_num };
        let node = self.pager.get_page(dest_page).expect("page already resident");
        let key = u32::from_le_bytes(cell[0..4].try_into().unwrap());
        btree::set_leaf_node_key(node, index_within_node, key);
        btree::leaf_node_value_mut(node, index_within_node).copy_from_slice(&cell[4..]);
    }

    /// Copies the cell at `source_index` within the old (pre-split) leaf
    /// to `index_within_node` of whichever half it lands in.
    fn move_cell(
        &mut self,
        old_page_num: u32,
        source_index: u32,
        dest_is_new: bool,
        new_page_num: u32,
        index_within_node: u32,
    ) {
        if dest_is_new {
            let old = self.pager.get_page(old_page_num).expect("resident");
            let key = btree::leaf_node_key(old, source_index);
            let value = btree::leaf_node_value(old, source_index).to_vec();
            let new_leaf = self.pager.get_page(new_page_num).expect("resident");
            btree::set_leaf_node_key(new_leaf, index_within_node, key);
            btree::leaf_node_value_mut(new_leaf, index_within_node).copy_from_slice(&value);
        } else if source_index != index_within_node {
            let old = self.pager.get_page(old_page_num).expect("resident");
            btree::copy_within_leaf(old, index_within_node, source_index);
        }
    }

    /// Inserts a routing entry for `child_page_num` into the internal
    /// node at `parent_page_num`. Fails fatally once the node is full —
    /// growing an internal node past one level is not supported.
    fn internal_node_insert(&mut self, parent_page_num: u32, child_page_num: u32) -> Result<(), Error> {
        let child_max_key = {
            let child = self.pager.get_page(child_page_num)?;
            btree::node_max_key(child)
        };

        let parent = self.pager.get_page(parent_page_num)?;
        let original_num_keys = btree::internal_node_num_keys(parent);
        if original_num_keys as usize >= btree::INTERNAL_NODE_MAX_CELLS {
            warn!(parent_page_num, "internal node overflow");
            return Err(err!(
                Fatal,
                "Need to implement splitting internal node after INTERNAL_NODE_MAX_CELLS."
            ));
        }

        let right_child_page_num = btree::internal_node_right_child(parent);
        let right_child_max_key = {
            let right_child = self.pager.get_page(right_child_page_num)?;
            btree::node_max_key(right_child)
        };

        let parent = self.pager.get_page(parent_page_num)?;
        btree::set_internal_node_num_keys(parent, original_num_keys + 1);

        if child_max_key > right_child_max_key {
            // New child becomes the rightmost; the old right child slides
            // into the last key slot.
            btree::set_internal_node_child(parent, original_num_keys, right_child_page_num);
            btree::set_internal_node_key(parent, original_num_keys, right_child_max_key);
            btree::set_internal_node_right_child(parent, child_page_num);
        } else {
            let index = btree::internal_node_find_child_index(parent, child_max_key);
            for i in (index..original_num_keys).rev() {
                btree::shift_internal_cell_right(parent, i);
            }
            btree::set_internal_node_child(parent, index, child_page_num);
            btree::set_internal_node_key(parent, index, child_max_key);
        }
        Ok(())
    }

    /// The old root's content is copied into a new left child; the root
    /// page is reinitialized as a 1-key internal node pointing at the
    /// old content (now `left_child_page_num`) and `right_child_page_num`.
    fn create_new_root(&mut self, right_child_page_num: u32) -> Result<(), Error> {
        let left_child_page_num = self.pager.unused_page_num();
        let root = self.root_page_num;

        let root_copy = *self.pager.get_page(root)?;
        {
            let left_child = self.pager.get_page(left_child_page_num)?;
            *left_child = root_copy;
            btree::set_is_root(left_child, false);
        }
        let left_max_key = {
            let left_child = self.pager.get_page(left_child_page_num)?;
            btree::node_max_key(left_child)
        };

        for page_num in [left_child_page_num, right_child_page_num] {
            let child = self.pager.get_page(page_num)?;
            btree::set_parent_page_num(child, root);
        }

        let root_node = self.pager.get_page(root)?;
        btree::initialize_internal_node(root_node);
        btree::set_is_root(root_node, true);
        btree::set_internal_node_num_keys(root_node, 1);
        btree::set_internal_node_child(root_node, 0, left_child_page_num);
        btree::set_internal_node_key(root_node, 0, left_max_key);
        btree::set_internal_node_right_child(root_node, right_child_page_num);

        info!(left_child_page_num, right_child_page_num, "grew tree by one level");
        Ok(())
    }
}

fn leaf_node_insert(node: &mut PageBuf, cell_num: u32, row: &Row) {
    let num_cells = btree::leaf_node_num_cells(node);
    for i in (cell_num..num_cells).rev() {
        btree::copy_within_leaf(node, i + 1, i);
    }
    btree::set_leaf_node_num_cells(node, num_cells + 1);
    btree::set_leaf_node_key(node, cell_num, row.id);
    row.serialize(btree::leaf_node_value_mut(node, cell_num));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tmp() -> (tempfile::NamedTempFile, Table) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let table = Table::open(file.path()).unwrap();
        (file, table)
    }

    #[test]
    fn insert_then_select_round_trips() {
        let (_file, mut table) = open_tmp();
        table.insert(&Row::new(1, "alice", "alice@x.com")).unwrap();
        table.insert(&Row::new(2, "bob", "bob@x.com")).unwrap();
        let rows = table.select().unwrap();
        assert_eq!(rows, vec![Row::new(1, "alice", "alice@x.com"), Row::new(2, "bob", "bob@x.com")]);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let (_file, mut table) = open_tmp();
        table.insert(&Row::new(1, "alice", "alice@x.com")).unwrap();
        let err = table.insert(&Row::new(1, "eve", "eve@x.com")).unwrap_err();
        assert!(matches!(err, Error::Duplicate));
    }

    #[test]
    fn out_of_order_inserts_select_in_key_order() {
        let (_file, mut table) = open_tmp();
        for id in [5u32, 1, 3, 2, 4] {
            table.insert(&Row::new(id, format!("u{id}"), format!("u{id}@x.com"))).unwrap();
        }
        let ids: Vec<u32> = table.select().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fourteenth_insert_splits_the_root_leaf() {
        let (_file, mut table) = open_tmp();
        for id in 1u32..=14 {
            table.insert(&Row::new(id, format!("u{id}"), format!("u{id}@x.com"))).unwrap();
        }
        let rows = table.select().unwrap();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows.first().unwrap().id, 1);
        assert_eq!(rows.last().unwrap().id, 14);

        let root = table.pager.get_page(table.root_page_num).unwrap();
        assert_eq!(btree::node_type(root), btree::NodeType::Internal);
        assert_eq!(btree::internal_node_num_keys(root), 1);
    }

    #[test]
    fn persists_across_close_and_reopen() {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut table = Table::open(file.path()).unwrap();
            table.insert(&Row::new(1, "alice", "alice@x.com")).unwrap();
            table.close().unwrap();
        }
        {
            let mut table = Table::open(file.path()).unwrap();
            let rows = table.select().unwrap();
            assert_eq!(rows, vec![Row::new(1, "alice", "alice@x.com")]);
        }
    }
}
