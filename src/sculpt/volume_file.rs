//! Sculpture files
//!
//! A 32-byte little-endian header followed by the raw `R32Float` voxel grid,
//! x fastest, then y, then z. The header carries a CRC32 of the payload.
//! Writes go to a temporary file next to the target that is renamed over it
//! once synced, so a crash never leaves a half written sculpture behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use memmap2::Mmap;

use crate::error::{EngineError, EngineResult};

pub const MAGIC: [u8; 4] = *b"VXSC";
pub const VERSION: u32 = 1;
pub const BYTES_PER_VOXEL: u32 = 4;

/// File extension used by the save dialogs and the command line
pub const EXTENSION: &str = "vxs";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VolumeHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub bytes_per_voxel: u32,
    pub checksum: u32,
    pub reserved: u32,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<VolumeHeader>();

impl VolumeHeader {
    fn new(size: [u32; 3], checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION.to_le(),
            width: size[0].to_le(),
            height: size[1].to_le(),
            depth: size[2].to_le(),
            bytes_per_voxel: BYTES_PER_VOXEL.to_le(),
            checksum: checksum.to_le(),
            reserved: 0,
        }
    }

    /// Header fields in native byte order
    fn to_native(self) -> Self {
        Self {
            magic: self.magic,
            version: u32::from_le(self.version),
            width: u32::from_le(self.width),
            height: u32::from_le(self.height),
            depth: u32::from_le(self.depth),
            bytes_per_voxel: u32::from_le(self.bytes_per_voxel),
            checksum: u32::from_le(self.checksum),
            reserved: u32::from_le(self.reserved),
        }
    }

    pub fn size(&self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }

    pub fn payload_len(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64 * self.bytes_per_voxel as u64
    }
}

/// A loaded voxel grid
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeData {
    pub size: [u32; 3],
    /// Raw `R32Float` bytes
    pub voxels: Vec<u8>,
}

fn corrupted(path: &Path, what: impl std::fmt::Display) -> EngineError {
    EngineError::CorruptedData(format!("{}: {}", path.display(), what))
}

/// Path the payload is written to before it replaces `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `voxels` atomically to `path`
pub fn write(path: &Path, size: [u32; 3], voxels: &[u8]) -> EngineResult<()> {
    let expected = size.iter().map(|&d| d as u64).product::<u64>() * BYTES_PER_VOXEL as u64;
    if voxels.len() as u64 != expected {
        return Err(EngineError::BufferError(format!(
            "{:?} volume needs {} bytes, got {}",
            size,
            expected,
            voxels.len()
        )));
    }

    let header = VolumeHeader::new(size, crc32fast::hash(voxels));
    let temp = temp_path(path);

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(bytemuck::bytes_of(&header))?;
        file.write_all(voxels)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(EngineError::io(path, e));
    }

    log::debug!(
        "[VolumeFile] Wrote {:?} volume to {}",
        size,
        path.display()
    );
    Ok(())
}

/// Read and validate a sculpture file
pub fn read(path: &Path) -> EngineResult<VolumeData> {
    let file = File::open(path).map_err(|e| EngineError::io(path, e))?;

    // SAFETY: the mapping is read-only and dropped before this function
    // returns; sculpture files are only replaced by rename, never modified
    // in place.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| EngineError::io(path, e))?;

    if map.len() < HEADER_SIZE {
        return Err(corrupted(path, "truncated header"));
    }
    let header: VolumeHeader = bytemuck::pod_read_unaligned::<VolumeHeader>(&map[..HEADER_SIZE]).to_native();

    if header.magic != MAGIC {
        return Err(corrupted(path, "not a sculpture file"));
    }
    if header.version != VERSION {
        return Err(corrupted(path, format!("unsupported version {}", header.version)));
    }
    if header.bytes_per_voxel != BYTES_PER_VOXEL {
        return Err(corrupted(
            path,
            format!("{} bytes per voxel", header.bytes_per_voxel),
        ));
    }
    if header.size().iter().any(|&extent| extent == 0) {
        return Err(corrupted(path, format!("empty volume {:?}", header.size())));
    }

    let payload = &map[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len() {
        return Err(corrupted(
            path,
            format!(
                "payload is {} bytes, header says {}",
                payload.len(),
                header.payload_len()
            ),
        ));
    }
    if crc32fast::hash(payload) != header.checksum {
        return Err(corrupted(path, "checksum mismatch"));
    }

    Ok(VolumeData {
        size: header.size(),
        voxels: payload.to_vec(),
    })
}
