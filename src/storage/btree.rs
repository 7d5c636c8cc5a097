//! B+ tree node layout and accessors.
//!
//! Every page is one node. A node is either a leaf (holds rows) or
//! internal (holds routing keys and child page numbers). Both share a
//! 6-byte common header.
//!
//! All multi-byte fields are little-endian, explicitly, via
//! `to_le_bytes`/`from_le_bytes`, so the file format is portable across
//! host architectures.

use super::row::ROW_SIZE;
use crate::errors::Error;

pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: usize = 100;

/// 0 is reserved to mean "no sibling" / "no child"; it is also the root's
/// page number, so an internal node freshly initialized must not leave its
/// right child at 0 or it would look like a pointer to the root.
pub const INVALID_PAGE_NUM: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

// --- Common node header --------------------------------------------------

const NODE_TYPE_OFFSET: usize = 0;
const NODE_TYPE_SIZE: usize = 1;
const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
const IS_ROOT_SIZE: usize = 1;
const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
const PARENT_POINTER_SIZE: usize = 4;
pub const COMMON_NODE_HEADER_SIZE: usize =
    NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// --- Leaf node header / body ---------------------------------------------

const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const LEAF_NODE_NUM_CELLS_SIZE: usize = 4;
const LEAF_NODE_NEXT_LEAF_OFFSET: usize = LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
const LEAF_NODE_NEXT_LEAF_SIZE: usize = 4;
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

const LEAF_NODE_KEY_SIZE: usize = 4;
const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: usize = LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE;

pub const LEAF_NODE_RIGHT_SPLIT_COUNT: usize = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: usize =
    (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// --- Internal node header / body ------------------------------------------

const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
const INTERNAL_NODE_NUM_KEYS_SIZE: usize = 4;
const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

const INTERNAL_NODE_CHILD_SIZE: usize = 4;
const INTERNAL_NODE_KEY_SIZE: usize = 4;
const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;

/// Kept deliberately small (3) so a handful of inserts exercises internal
/// routing. Splitting an internal node once it overflows is out of scope;
/// `internal_node_insert` aborts fatally instead.
pub const INTERNAL_NODE_MAX_CELLS: usize = 3;

/// A single 4096-byte page buffer, viewed as a B+ tree node.
pub type PageBuf = [u8; PAGE_SIZE];

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn set_u32_at(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn node_type(buf: &PageBuf) -> NodeType {
    match buf[NODE_TYPE_OFFSET] {
        0 => NodeType::Internal,
        1 => NodeType::Leaf,
        other => unreachable!("invalid node type byte {other}"),
    }
}

pub fn set_node_type(buf: &mut PageBuf, t: NodeType) {
    buf[NODE_TYPE_OFFSET] = match t {
        NodeType::Internal => 0,
        NodeType::Leaf => 1,
    };
}

pub fn is_root(buf: &PageBuf) -> bool {
    buf[IS_ROOT_OFFSET] != 0
}

pub fn set_is_root(buf: &mut PageBuf, is_root: bool) {
    buf[IS_ROOT_OFFSET] = is_root as u8;
}

pub fn parent_page_num(buf: &PageBuf) -> u32 {
    u32_at(buf, PARENT_POINTER_OFFSET)
}

pub fn set_parent_page_num(buf: &mut PageBuf, page_num: u32) {
    set_u32_at(buf, PARENT_POINTER_OFFSET, page_num);
}

/// The key at `num_keys - 1` for internal nodes, or the key of the last
/// cell for leaves. Never called on an empty node.
pub fn node_max_key(buf: &PageBuf) -> u32 {
    match node_type(buf) {
        NodeType::Internal => internal_node_key(buf, internal_node_num_keys(buf) - 1),
        NodeType::Leaf => leaf_node_key(buf, leaf_node_num_cells(buf) - 1),
    }
}

// --- Leaf accessors --------------------------------------------------------

pub fn leaf_node_num_cells(buf: &PageBuf) -> u32 {
    u32_at(buf, LEAF_NODE_NUM_CELLS_OFFSET)
}

pub fn set_leaf_node_num_cells(buf: &mut PageBuf, num_cells: u32) {
    set_u32_at(buf, LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
}

pub fn leaf_node_next_leaf(buf: &PageBuf) -> u32 {
    u32_at(buf, LEAF_NODE_NEXT_LEAF_OFFSET)
}

pub fn set_leaf_node_next_leaf(buf: &mut PageBuf, page_num: u32) {
    set_u32_at(buf, LEAF_NODE_NEXT_LEAF_OFFSET, page_num);
}

fn leaf_node_cell_offset(cell_num: u32) -> usize {
    LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE
}

pub fn leaf_node_key(buf: &PageBuf, cell_num: u32) -> u32 {
    u32_at(buf, leaf_node_cell_offset(cell_num))
}

pub fn set_leaf_node_key(buf: &mut PageBuf, cell_num: u32, key: u32) {
    let offset = leaf_node_cell_offset(cell_num);
    set_u32_at(buf, offset, key);
}

pub fn leaf_node_value(buf: &PageBuf, cell_num: u32) -> &[u8] {
    let offset = leaf_node_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
    &buf[offset..offset + LEAF_NODE_VALUE_SIZE]
}

pub fn leaf_node_value_mut(buf: &mut PageBuf, cell_num: u32) -> &mut [u8] {
    let offset = leaf_node_cell_offset(cell_num) + LEAF_NODE_KEY_SIZE;
    &mut buf[offset..offset + LEAF_NODE_VALUE_SIZE]
}

/// Copies the `(key, value)` cell at `from` (within `src`) to `to` (within
/// `dst`). `src` and `dst` may be the same buffer (shifting within a node)
/// or different buffers (splitting into a new leaf).
pub fn copy_leaf_cell(dst: &mut PageBuf, to: u32, src: &PageBuf, from: u32) {
    let from_off = leaf_node_cell_offset(from);
    let to_off = leaf_node_cell_offset(to);
    let cell = src[from_off..from_off + LEAF_NODE_CELL_SIZE].to_vec();
    dst[to_off..to_off + LEAF_NODE_CELL_SIZE].copy_from_slice(&cell);
}

/// Copies the cell at `from` to `to` within the same leaf, used to open
/// up (or close) a gap during an in-place insert/shift.
pub fn copy_within_leaf(buf: &mut PageBuf, to: u32, from: u32) {
    if to == from {
        return;
    }
    let from_off = leaf_node_cell_offset(from);
    let mut tmp = [0u8; LEAF_NODE_CELL_SIZE];
    tmp.copy_from_slice(&buf[from_off..from_off + LEAF_NODE_CELL_SIZE]);
    let to_off = leaf_node_cell_offset(to);
    buf[to_off..to_off + LEAF_NODE_CELL_SIZE].copy_from_slice(&tmp);
}

pub fn initialize_leaf_node(buf: &mut PageBuf) {
    set_node_type(buf, NodeType::Leaf);
    set_is_root(buf, false);
    set_leaf_node_num_cells(buf, 0);
    set_leaf_node_next_leaf(buf, 0);
}

// --- Internal accessors ------------------------------------------------

pub fn internal_node_num_keys(buf: &PageBuf) -> u32 {
    u32_at(buf, INTERNAL_NODE_NUM_KEYS_OFFSET)
}

pub fn set_internal_node_num_keys(buf: &mut PageBuf, num_keys: u32) {
    set_u32_at(buf, INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
}

pub fn internal_node_right_child(buf: &PageBuf) -> u32 {
    u32_at(buf, INTERNAL_NODE_RIGHT_CHILD_OFFSET)
}

pub fn set_internal_node_right_child(buf: &mut PageBuf, page_num: u32) {
    set_u32_at(buf, INTERNAL_NODE_RIGHT_CHILD_OFFSET, page_num);
}

fn internal_node_cell_offset(cell_num: u32) -> usize {
    INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE
}

pub fn internal_node_child(buf: &PageBuf, cell_num: u32) -> u32 {
    u32_at(buf, internal_node_cell_offset(cell_num))
}

pub fn set_internal_node_child(buf: &mut PageBuf, cell_num: u32, child_page_num: u32) {
    let offset = internal_node_cell_offset(cell_num);
    set_u32_at(buf, offset, child_page_num);
}

pub fn internal_node_key(buf: &PageBuf, cell_num: u32) -> u32 {
    let offset = internal_node_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE;
    u32_at(buf, offset)
}

pub fn set_internal_node_key(buf: &mut PageBuf, cell_num: u32, key: u32) {
    let offset = internal_node_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE;
    set_u32_at(buf, offset, key);
}

/// The child page for routing index `child_num`, where `child_num ==
/// num_keys` means the right child.
pub fn internal_node_child_page(buf: &PageBuf, child_num: u32) -> Result<u32, Error> {
    let num_keys = internal_node_num_keys(buf);
    if child_num > num_keys {
        return Err(err!(
            Fatal,
            "child index {child_num} out of bounds (num_keys = {num_keys})"
        ));
    }
    if child_num == num_keys {
        Ok(internal_node_right_child(buf))
    } else {
        Ok(internal_node_child(buf, child_num))
    }
}

/// Binary search for the smallest cell index whose key is `>= key`. Used
/// both to find the routing child during descent and to locate the
/// separator to rewrite in `update_internal_node_key`.
pub fn internal_node_find_child_index(buf: &PageBuf, key: u32) -> u32 {
    let mut min_index = 0u32;
    let mut max_index = internal_node_num_keys(buf);
    while min_index != max_index {
        let mid = (min_index + max_index) / 2;
        if internal_node_key(buf, mid) >= key {
            max_index = mid;
        } else {
            min_index = mid + 1;
        }
    }
    min_index
}

/// Rewrites the separator key that used to equal `old_key` to `new_key`.
/// Called after a child's max key changes (a split or the rightmost
/// insert), since an internal node stores each child's max key as its
/// own routing key.
pub fn update_internal_node_key(buf: &mut PageBuf, old_key: u32, new_key: u32) {
    let old_child_index = internal_node_find_child_index(buf, old_key);
    if old_child_index < internal_node_num_keys(buf) {
        set_internal_node_key(buf, old_child_index, new_key);
    }
}

/// Moves the `(child, key)` cell at index `i` to `i + 1`, opening a gap
/// at `i` for an insertion.
pub fn shift_internal_cell_right(buf: &mut PageBuf, i: u32) {
    let child = internal_node_child(buf, i);
    let key = internal_node_key(buf, i);
    set_internal_node_child(buf, i + 1, child);
    set_internal_node_key(buf, i + 1, key);
}

pub fn initialize_internal_node(buf: &mut PageBuf) {
    set_node_type(buf, NodeType::Internal);
    set_is_root(buf, false);
    set_internal_node_num_keys(buf, 0);
    // A freshly initialized internal node has no right child yet; 0 would
    // be indistinguishable from "points at the root page".
    set_internal_node_right_child(buf, INVALID_PAGE_NUM);
}

use crate::err;

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_leaf() -> PageBuf {
        let mut buf = [0u8; PAGE_SIZE];
        initialize_leaf_node(&mut buf);
        buf
    }

    fn blank_internal() -> PageBuf {
        let mut buf = [0u8; PAGE_SIZE];
        initialize_internal_node(&mut buf);
        buf
    }

    #[test]
    fn layout_constants_are_bit_exact() {
        assert_eq!(ROW_SIZE, 291);
        assert_eq!(COMMON_NODE_HEADER_SIZE, 6);
        assert_eq!(LEAF_NODE_HEADER_SIZE, 14);
        assert_eq!(LEAF_NODE_CELL_SIZE, 295);
        assert_eq!(LEAF_NODE_SPACE_FOR_CELLS, 4082);
        assert_eq!(LEAF_NODE_MAX_CELLS, 13);
        assert_eq!(LEAF_NODE_LEFT_SPLIT_COUNT, 7);
        assert_eq!(LEAF_NODE_RIGHT_SPLIT_COUNT, 7);
    }

    #[test]
    fn leaf_cell_round_trip() {
        let mut buf = blank_leaf();
        set_leaf_node_num_cells(&mut buf, 1);
        set_leaf_node_key(&mut buf, 0, 42);
        leaf_node_value_mut(&mut buf, 0)[0] = 9;
        assert_eq!(leaf_node_key(&buf, 0), 42);
        assert_eq!(leaf_node_value(&buf, 0)[0], 9);
        assert_eq!(node_max_key(&buf), 42);
    }

    #[test]
    fn leaf_next_sentinel_defaults_to_zero() {
        let buf = blank_leaf();
        assert_eq!(leaf_node_next_leaf(&buf), 0);
    }

    #[test]
    fn internal_cell_round_trip() {
        let mut buf = blank_internal();
        set_internal_node_num_keys(&mut buf, 2);
        set_internal_node_child(&mut buf, 0, 3);
        set_internal_node_key(&mut buf, 0, 10);
        set_internal_node_child(&mut buf, 1, 4);
        set_internal_node_key(&mut buf, 1, 20);
        set_internal_node_right_child(&mut buf, 5);
        assert_eq!(internal_node_child_page(&buf, 0).unwrap(), 3);
        assert_eq!(internal_node_child_page(&buf, 1).unwrap(), 4);
        assert_eq!(internal_node_child_page(&buf, 2).unwrap(), 5);
        assert_eq!(node_max_key(&buf), 20);
    }

    #[test]
    fn find_child_index_picks_smallest_key_geq() {
        let mut buf = blank_internal();
        set_internal_node_num_keys(&mut buf, 3);
        set_internal_node_key(&mut buf, 0, 5);
        set_internal_node_key(&mut buf, 1, 10);
        set_internal_node_key(&mut buf, 2, 15);
        assert_eq!(internal_node_find_child_index(&buf, 3), 0);
        assert_eq!(internal_node_find_child_index(&buf, 5), 0);
        assert_eq!(internal_node_find_child_index(&buf, 6), 1);
        assert_eq!(internal_node_find_child_index(&buf, 16), 3);
    }

    #[test]
    fn copy_leaf_cell_moves_key_and_value() {
        let mut src = blank_leaf();
        set_leaf_node_num_cells(&mut src, 1);
        set_leaf_node_key(&mut src, 0, 7);
        leaf_node_value_mut(&mut src, 0)[0] = 1;

        let mut dst = blank_leaf();
        copy_leaf_cell(&mut dst, 0, &src, 0);
        assert_eq!(leaf_node_key(&dst, 0), 7);
        assert_eq!(leaf_node_value(&dst, 0)[0], 1);
    }
}
