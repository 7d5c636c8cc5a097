//! A transient `(page, cell)` position into the tree.
//!
//! `Cursor<'a>` borrows the table mutably for its whole lifetime. A cursor
//! can't be held across a subsequent mutating call (an insert that might
//! split the very leaf it points into) because the borrow checker won't
//! allow two live `&mut Table` borrows to coexist.

use super::btree::{self, PageBuf};
use super::row::ROW_SIZE;
use super::table::Table;
use crate::errors::Error;

pub struct Cursor<'a> {
    pub(crate) table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: u32,
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Descends from the root to the leaf that would hold `key`, landing
    /// on the matching cell or on the insertion point.
    pub fn find(table: &'a mut Table, key: u32) -> Result<Cursor<'a>, Error> {
        let mut page_num = table.root_page_num;
        loop {
            let node = table.pager.get_page(page_num)?;
            match btree::node_type(node) {
                btree::NodeType::Leaf => break,
                btree::NodeType::Internal => {
                    let child_index = btree::internal_node_find_child_index(node, key);
                    page_num = btree::internal_node_child_page(node, child_index)?;
                }
            }
        }

        let node = table.pager.get_page(page_num)?;
        let cell_num = leaf_node_find_cell(node, key);
        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// The leftmost leaf's first cell, with `end_of_table` set if the
    /// tree is empty.
    pub fn start(table: &'a mut Table) -> Result<Cursor<'a>, Error> {
        let mut cursor = Cursor::find(table, 0)?;
        let num_cells = btree::leaf_node_num_cells(cursor.table.pager.get_page(cursor.page_num)?);
        cursor.end_of_table = num_cells == 0;
        Ok(cursor)
    }

    /// The current cell's row bytes, mutable in place. A cursor from
    /// `find`/`start` always points at an already-resident leaf page, so
    /// this can't fail in ordinary use; a missing page here means the
    /// cursor outlived the table state it was built from.
    pub fn value_bytes(&mut self) -> &mut [u8; ROW_SIZE] {
        let node = self
            .table
            .pager
            .get_page(self.page_num)
            .expect("cursor page_num is always resident");
        btree::leaf_node_value_mut(node, self.cell_num)
            .try_into()
            .expect("leaf cell value is exactly ROW_SIZE bytes")
    }

    /// Advances to the next cell, following `next_leaf_page` across a
    /// leaf boundary and setting `end_of_table` at the end of the chain.
    pub fn advance(&mut self) -> Result<(), Error> {
        let node = self.table.pager.get_page(self.page_num)?;
        let num_cells = btree::leaf_node_num_cells(node);
        self.cell_num += 1;
        if self.cell_num >= num_cells {
            let next = btree::leaf_node_next_leaf(node);
            if next == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

/// Binary search for `key` (or its insertion point) within a leaf.
fn leaf_node_find_cell(node: &PageBuf, key: u32) -> u32 {
    let mut min_index = 0u32;
    let mut one_past_max = btree::leaf_node_num_cells(node);
    while one_past_max != min_index {
        let index = (min_index + one_past_max) / 2;
        let key_at_index = btree::leaf_node_key(node, index);
        if key == key_at_index {
            return index;
        }
        if key < key_at_index {
            one_past_max = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}
