//! Append-only item arena.
//!
//! Every item is stored as an 8-byte header followed by its JSON payload,
//! padded to an 8-byte boundary:
//!
//! ```text
//! ┌──────────────────┬──────┬───────┬──────────┬──────────────┬─────────┐
//! │ payload len: u32 │ type │ flags │ reserved │ payload JSON │ padding │
//! └──────────────────┴──────┴───────┴──────────┴──────────────┴─────────┘
//! ```
//!
//! Offsets returned by [`Buffer::append`] stay valid until the buffer is
//! cleared or purged. Only the committed prefix is visible to iteration.

use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::errors::{CollectorError, Result};
use crate::types::{Area, Item, ItemType};

const HEADER_SIZE: usize = 8;
const ALIGN: usize = 8;
const DELETED_FLAG: u8 = 0x01;

/// Whether a buffer may grow beyond its initial capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoGrow {
    Yes,
    No,
}

fn padded_size(payload_len: usize) -> usize {
    (HEADER_SIZE + payload_len).div_ceil(ALIGN) * ALIGN
}

/// A growable byte arena holding serialized [`Item`]s.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    capacity: usize,
    committed: usize,
    auto_grow: AutoGrow,
}

/// Header fields of a stored item.
#[derive(Debug, Clone, Copy)]
struct ItemHeader {
    payload_len: usize,
    item_type: ItemType,
    deleted: bool,
}

impl ItemHeader {
    fn padded_size(&self) -> usize {
        padded_size(self.payload_len)
    }
}

impl Buffer {
    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn new(capacity: usize, auto_grow: AutoGrow) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            committed: 0,
            auto_grow,
        }
    }

    /// Bytes available before the buffer has to grow (or fail).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far, committed or not.
    pub fn written(&self) -> usize {
        self.data.len()
    }

    /// Bytes in the committed, readable prefix.
    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    pub fn auto_grow(&self) -> AutoGrow {
        self.auto_grow
    }

    /// Serializes `item` into the buffer and returns its offset.
    ///
    /// The item is written but not committed; call [`Buffer::commit`] to make
    /// it visible, or [`Buffer::rollback`] to discard it.
    pub fn append(&mut self, item: &Item) -> Result<usize> {
        let payload = serde_json::to_vec(item)?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| CollectorError::Buffer {
            message: format!("item of {} bytes is too large", payload.len()),
            offset: self.data.len(),
        })?;

        let size = padded_size(payload.len());
        self.reserve(size)?;

        let offset = self.data.len();
        self.data.extend_from_slice(&payload_len.to_le_bytes());
        self.data.push(item.item_type().to_byte());
        self.data.push(0);
        self.data.extend_from_slice(&[0, 0]);
        self.data.extend_from_slice(&payload);
        self.data.resize(offset + size, 0);
        Ok(offset)
    }

    /// Marks everything written so far as committed.
    ///
    /// Returns the offset where the newly committed region starts.
    pub fn commit(&mut self) -> usize {
        let start = self.committed;
        self.committed = self.data.len();
        start
    }

    /// Discards everything written since the last commit.
    pub fn rollback(&mut self) {
        self.data.truncate(self.committed);
    }

    /// Resets the buffer to empty. Capacity is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.committed = 0;
    }

    /// Decodes the item stored at `offset`.
    pub fn get(&self, offset: usize) -> Result<Item> {
        let header = self.header(offset)?;
        let start = offset + HEADER_SIZE;
        let item = serde_json::from_slice(&self.data[start..start + header.payload_len])?;
        Ok(item)
    }

    pub fn item_type(&self, offset: usize) -> Result<ItemType> {
        Ok(self.header(offset)?.item_type)
    }

    pub fn is_deleted(&self, offset: usize) -> Result<bool> {
        Ok(self.header(offset)?.deleted)
    }

    /// Sets or clears the deleted flag of the item at `offset` in place.
    pub fn set_deleted(&mut self, offset: usize, deleted: bool) -> Result<()> {
        self.header(offset)?;
        let flags = &mut self.data[offset + 5];
        if deleted {
            *flags |= DELETED_FLAG;
        } else {
            *flags &= !DELETED_FLAG;
        }
        Ok(())
    }

    /// Iterates over all committed items, including deleted ones.
    pub fn iter(&self) -> ItemIter<'_> {
        ItemIter {
            buffer: self,
            offset: 0,
        }
    }

    /// Decodes all committed items that are not marked deleted.
    pub fn items(&self) -> impl Iterator<Item = Result<Item>> + '_ {
        self.iter().filter(|v| !v.deleted()).map(|v| v.decode())
    }

    /// Decodes all live committed areas.
    pub fn areas(&self) -> Result<Vec<Area>> {
        let mut areas = Vec::new();
        let mut views = self.iter();
        while let Some(view) = views.next_view() {
            let view = view?;
            if view.deleted() || view.item_type() != ItemType::Area {
                continue;
            }
            if let Item::Area(area) = view.decode()? {
                areas.push(area);
            }
        }
        Ok(areas)
    }

    /// Number of committed items, including deleted ones.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Total bytes taken by committed items marked deleted.
    pub fn deleted_bytes(&self) -> usize {
        self.iter()
            .filter(|v| v.deleted())
            .map(|v| v.size())
            .sum()
    }

    /// Compacts the committed region by dropping deleted items.
    ///
    /// Live items are moved towards the start of the buffer in order;
    /// `on_move(old_offset, new_offset)` is called for every item that moved.
    /// Returns the number of bytes reclaimed. Fails if there is uncommitted
    /// data, since moving items would corrupt it.
    pub fn purge_deleted<F>(&mut self, mut on_move: F) -> Result<usize>
    where
        F: FnMut(usize, usize),
    {
        if self.data.len() != self.committed {
            return Err(CollectorError::Buffer {
                message: "cannot purge a buffer with uncommitted data".to_string(),
                offset: self.committed,
            });
        }

        let mut read = 0;
        let mut write = 0;
        while read < self.committed {
            let header = self.header(read)?;
            let size = header.padded_size();
            if !header.deleted {
                if read != write {
                    self.data.copy_within(read..read + size, write);
                    on_move(read, write);
                }
                write += size;
            }
            read += size;
        }

        self.data.truncate(write);
        self.committed = write;
        Ok(read - write)
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self.data.len() + additional;
        if required <= self.capacity {
            return Ok(());
        }
        match self.auto_grow {
            AutoGrow::No => Err(CollectorError::Capacity {
                required,
                capacity: self.capacity,
            }),
            AutoGrow::Yes => {
                let mut new_capacity = self.capacity.max(ALIGN);
                while new_capacity < required {
                    new_capacity *= 2;
                }
                self.data.reserve(new_capacity - self.data.len());
                self.capacity = new_capacity;
                Ok(())
            }
        }
    }

    fn header(&self, offset: usize) -> Result<ItemHeader> {
        if offset % ALIGN != 0 || offset + HEADER_SIZE > self.data.len() {
            return Err(CollectorError::Buffer {
                message: "offset does not point at an item".to_string(),
                offset,
            });
        }

        let mut len = [0u8; 4];
        len.copy_from_slice(&self.data[offset..offset + 4]);
        let payload_len = u32::from_le_bytes(len) as usize;

        let item_type =
            ItemType::from_byte(self.data[offset + 4]).ok_or_else(|| CollectorError::Buffer {
                message: format!("unknown item type byte {}", self.data[offset + 4]),
                offset,
            })?;

        if offset + padded_size(payload_len) > self.data.len() {
            return Err(CollectorError::Buffer {
                message: "item extends past the written region".to_string(),
                offset,
            });
        }

        Ok(ItemHeader {
            payload_len,
            item_type,
            deleted: self.data[offset + 5] & DELETED_FLAG != 0,
        })
    }
}

/// Borrowed view of one stored item.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    offset: usize,
    header: ItemHeader,
    payload: &'a [u8],
}

impl<'a> ItemView<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn item_type(&self) -> ItemType {
        self.header.item_type
    }

    pub fn deleted(&self) -> bool {
        self.header.deleted
    }

    /// Bytes occupied in the buffer, header and padding included.
    pub fn size(&self) -> usize {
        self.header.padded_size()
    }

    /// Raw JSON payload.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn decode(&self) -> Result<Item> {
        Ok(serde_json::from_slice(self.payload)?)
    }
}

/// Iterator over the committed items of a [`Buffer`].
pub struct ItemIter<'a> {
    buffer: &'a Buffer,
    offset: usize,
}

impl<'a> ItemIter<'a> {
    /// Like `next`, but hands back a corrupt header instead of ending.
    fn next_view(&mut self) -> Option<Result<ItemView<'a>>> {
        if self.offset >= self.buffer.committed {
            return None;
        }
        let header = match self.buffer.header(self.offset) {
            Ok(header) => header,
            Err(e) => {
                self.offset = self.buffer.committed;
                return Some(Err(e));
            }
        };
        let start = self.offset + HEADER_SIZE;
        let view = ItemView {
            offset: self.offset,
            header,
            payload: &self.buffer.data[start..start + header.payload_len],
        };
        self.offset += header.padded_size();
        Some(Ok(view))
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = ItemView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_view()? {
            Ok(view) => Some(view),
            Err(e) => {
                warn!(error = %e, "stopping iteration at corrupt item");
                None
            }
        }
    }
}
