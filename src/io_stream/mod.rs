//! Streaming container engine: writer and reader.
//!
//! # Writer
//! [`ContainerWriter`] reserves the superblock, then walks the in-memory tree
//! depth-first writing one DATA block per dataset (little-endian element
//! bytes, compressed with the dataset's own codec).  The INDEX block with the
//! node tree follows; the superblock is patched in place at offset 0 by
//! `finalize()`.
//!
//! # Reader
//! [`ContainerReader`] reads the superblock, seeks to the INDEX block and
//! rebuilds the tree, decoding every DATA block eagerly.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, trace};

use crate::block::{decode_block, encode_block, BlockHeader, BlockType};
use crate::codec::{CodecId, Compression};
use crate::error::{Error, Result};
use crate::index::{child_path, BlockRef, ContainerIndex, NodeRecord};
use crate::store::{Dataset, Group, Node};
use crate::superblock::{Superblock, SUPERBLOCK_SIZE};
use crate::value::NdArray;

/// Codec settings for the INDEX block.
const INDEX_COMPRESSION: Compression = Compression { codec: CodecId::Zstd, level: 3 };

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ContainerWriter<W: Write + Seek> {
    writer:            W,
    pub superblock:    Superblock,
    pub blocks_written: usize,
    pub bytes_stored:   u64,
}

impl<W: Write + Seek> ContainerWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_superblock(writer, Superblock::new())
    }

    /// Reuse an existing header so the container keeps its UUID across rewrites.
    pub fn with_superblock(mut writer: W, superblock: Superblock) -> Result<Self> {
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[0u8; SUPERBLOCK_SIZE])?; // reserved; overwritten on finalize
        Ok(Self {
            writer,
            superblock,
            blocks_written: 0,
            bytes_stored:   0,
        })
    }

    fn write_block(&mut self, block_type: BlockType, data: &[u8], compression: Compression) -> Result<(BlockHeader, BlockRef)> {
        let (header, payload) = encode_block(block_type, data, compression)?;
        let offset = self.writer.stream_position()?;
        header.write(&mut self.writer)?;
        self.writer.write_all(&payload)?;
        self.blocks_written += 1;
        self.bytes_stored   += payload.len() as u64;
        Ok((header, BlockRef { offset, stored_size: payload.len() as u64 }))
    }

    pub fn write_dataset(&mut self, path: String, dataset: &Dataset) -> Result<NodeRecord> {
        let bytes = dataset.data().to_le_bytes();
        let (_, block) = self.write_block(BlockType::Data, &bytes, dataset.compression())?;
        trace!(%path, offset = block.offset, raw = bytes.len(), stored = block.stored_size, "wrote data block");
        Ok(NodeRecord::Dataset {
            path,
            attrs:  dataset.attrs().clone(),
            dtype:  dataset.data().dtype(),
            shape:  dataset.shape().to_vec(),
            chunks: dataset.chunks().map(<[usize]>::to_vec),
            block,
        })
    }

    /// Write every dataset under `root` and return the index describing them.
    /// Groups are visited from an explicit stack, parents before children.
    pub fn write_tree(&mut self, root: &Group) -> Result<ContainerIndex> {
        let mut nodes = Vec::new();
        let mut pending = vec![(String::new(), root)];
        while let Some((path, group)) = pending.pop() {
            nodes.push(NodeRecord::Group { path: path.clone(), attrs: group.attrs().clone() });
            let mut subgroups = Vec::new();
            for (name, node) in group.iter() {
                let node_path = child_path(&path, name);
                match node {
                    Node::Group(g)   => subgroups.push((node_path, g)),
                    Node::Dataset(d) => nodes.push(self.write_dataset(node_path, d)?),
                }
            }
            pending.extend(subgroups.into_iter().rev());
        }
        debug!(blocks = self.blocks_written, bytes = self.bytes_stored, "wrote dataset blocks");
        Ok(ContainerIndex::new(nodes))
    }

    // ── Finalization ─────────────────────────────────────────────────────────

    /// Write the INDEX block, then patch the superblock at offset 0.
    /// Must be called exactly once.
    pub fn finalize(&mut self, index: &ContainerIndex) -> Result<()> {
        let index_payload = index.to_bytes()?;
        let (header, block) = self.write_block(BlockType::Index, &index_payload, INDEX_COMPRESSION)?;

        self.superblock.index_offset = block.offset;
        self.superblock.index_size   = block.stored_size;
        self.superblock.index_crc32  = header.checksum;
        self.superblock.touch();

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.superblock.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        debug!(index_offset = block.offset, index_size = block.stored_size, "patched superblock");
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ContainerReader<R: Read + Seek> {
    reader:         R,
    pub superblock: Superblock,
    pub index:      ContainerIndex,
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let sb = Superblock::read(&mut reader)?;

        let (header, payload) = read_block_at(&mut reader, sb.index_offset)?;
        if header.block_type != BlockType::Index {
            return Err(Error::corrupt(format!("block at {} is not an index block", sb.index_offset)));
        }
        if header.checksum != sb.index_crc32 {
            return Err(Error::corrupt("index checksum disagrees with superblock"));
        }
        let raw = decode_block(&header, &payload)?;
        let index = ContainerIndex::from_bytes(&raw)?;
        debug!(uuid = %sb.uuid, datasets = index.dataset_count(), "read container index");

        Ok(Self { reader, superblock: sb, index })
    }

    /// Materialize the node tree, decoding every dataset.
    pub fn load_tree(&mut self) -> Result<Group> {
        let nodes = std::mem::take(&mut self.index.nodes);
        let mut root: Option<Group> = None;
        let result = self.attach_all(&nodes, &mut root);
        self.index.nodes = nodes;
        result?;
        root.ok_or_else(|| Error::corrupt("index has no root group"))
    }

    fn attach_all(&mut self, nodes: &[NodeRecord], root: &mut Option<Group>) -> Result<()> {
        for record in nodes {
            let Some((parent_path, name)) = record.split_path() else {
                match record {
                    NodeRecord::Group { attrs, .. } if root.is_none() => {
                        *root = Some(Group::from_parts(attrs.clone(), BTreeMap::new()));
                    }
                    _ => return Err(Error::corrupt("index root is not a single group")),
                }
                continue;
            };
            let node = self.load_node(record)?;
            let parent = root
                .as_mut()
                .and_then(|r| r.walk_group_mut(parent_path))
                .ok_or_else(|| Error::corrupt(format!("index node {} has no parent group", record.path())))?;
            parent.attach(name, node)?;
        }
        Ok(())
    }

    fn load_node(&mut self, record: &NodeRecord) -> Result<Node> {
        match record {
            NodeRecord::Group { attrs, .. } => Ok(Node::Group(Group::from_parts(attrs.clone(), BTreeMap::new()))),
            NodeRecord::Dataset { attrs, dtype, shape, chunks, block, .. } => {
                let (header, payload) = read_block_at(&mut self.reader, block.offset)?;
                if header.block_type != BlockType::Data || header.stored_size != block.stored_size {
                    return Err(Error::corrupt(format!("index points at an unexpected block at {}", block.offset)));
                }
                let bytes = decode_block(&header, &payload)?;
                let data = NdArray::from_le_bytes(*dtype, shape, &bytes)?;
                let compression = match CodecId::from_byte(header.codec) {
                    Some(CodecId::None) | None => Compression::NONE,
                    Some(codec) => Compression { codec, level: i32::from(header.level) },
                };
                Ok(Node::Dataset(Dataset::from_parts(attrs.clone(), data, chunks.clone(), compression)))
            }
        }
    }
}

fn read_block_at<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<(BlockHeader, Vec<u8>)> {
    reader.seek(SeekFrom::Start(offset))?;
    let header = BlockHeader::read(&mut *reader)?;
    let payload_start = reader.stream_position()?;
    let file_end = reader.seek(SeekFrom::End(0))?;
    if header.stored_size > file_end.saturating_sub(payload_start) {
        return Err(Error::corrupt(format!(
            "block at {offset} claims {} stored bytes but only {} remain",
            header.stored_size,
            file_end.saturating_sub(payload_start)
        )));
    }
    reader.seek(SeekFrom::Start(payload_start))?;
    let mut payload = vec![0u8; header.stored_size as usize];
    reader.read_exact(&mut payload)?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TITLE_ATTR;
    use std::io::Cursor;

    #[test]
    fn tree_survives_a_write_read_cycle() {
        let mut root = Group::new();
        root.set_attr(TITLE_ATTR, "dict");
        let sub = root.create_group("key_a").unwrap();
        sub.set_attr(TITLE_ATTR, "list");
        let ds = sub
            .create_dataset("idx_0", Dataset::new(NdArray::from_vec(vec![1i32, 2, 3]), Compression::default()))
            .unwrap();
        ds.set_attr(TITLE_ATTR, "ndarray");

        let mut w = ContainerWriter::new(Cursor::new(Vec::new())).unwrap();
        let index = w.write_tree(&root).unwrap();
        w.finalize(&index).unwrap();
        let bytes = w.into_inner().into_inner();

        let mut r = ContainerReader::new(Cursor::new(bytes)).unwrap();
        let loaded = r.load_tree().unwrap();
        assert_eq!(loaded, root);
    }

    #[test]
    fn truncated_container_is_rejected() {
        let mut w = ContainerWriter::new(Cursor::new(Vec::new())).unwrap();
        let index = w.write_tree(&Group::new()).unwrap();
        w.finalize(&index).unwrap();
        let mut bytes = w.into_inner().into_inner();
        bytes.truncate(bytes.len() - 4);
        assert!(ContainerReader::new(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn deep_trees_load_back() {
        let mut root = Group::new();
        let mut group = &mut root;
        for _ in 0..300 {
            group = group.create_group("idx_0").unwrap();
            group.set_attr(TITLE_ATTR, "list");
        }
        group
            .create_dataset("idx_0", Dataset::new(NdArray::from_vec(vec![7i64]), Compression::NONE))
            .unwrap()
            .set_attr(TITLE_ATTR, "int");

        let mut w = ContainerWriter::new(Cursor::new(Vec::new())).unwrap();
        let index = w.write_tree(&root).unwrap();
        assert_eq!(index.nodes.len(), 302);
        w.finalize(&index).unwrap();
        let bytes = w.into_inner().into_inner();

        let mut r = ContainerReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.load_tree().unwrap(), root);
    }

    #[test]
    fn oversized_block_length_is_rejected_before_allocating() {
        let mut root = Group::new();
        root.create_dataset("x", Dataset::new(NdArray::from_vec(vec![1u8, 2, 3]), Compression::NONE))
            .unwrap();
        let mut w = ContainerWriter::new(Cursor::new(Vec::new())).unwrap();
        let index = w.write_tree(&root).unwrap();
        w.finalize(&index).unwrap();
        let mut bytes = w.into_inner().into_inner();

        // stored_size of the first data block, right after the superblock
        let at = SUPERBLOCK_SIZE + 16;
        bytes[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        let mut r = ContainerReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.load_tree(), Err(Error::Corrupt(_))));
    }
}
