//! Classic libpcap file format (microsecond records, Ethernet link
//! type).
//!
//! The compiler only treats capture files as a byte source/sink: the
//! reader yields `(timestamp, frame bytes)` pairs, the writer stores
//! frames with the offsets the compiler produced.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::packet::EthernetPacket;
use crate::val::Micros;

const MAGIC_US: u32 = 0xa1b2_c3d4;
const MAGIC_US_SWAPPED: u32 = 0xd4c3_b2a1;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;
const LINKTYPE_ETHERNET: u32 = 1;
const SNAPLEN: u32 = 65535;

/// Reads a classic pcap file, honoring both byte orders.
pub struct PcapReader {
    reader: BufReader<File>,
    big_endian: bool,
}

impl PcapReader {
    /// Open a capture file and validate its global header.
    pub fn open(path: &Path) -> io::Result<PcapReader> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; 24];
        reader.read_exact(&mut header)?;
        let big_endian = match LittleEndian::read_u32(&header[0..4]) {
            MAGIC_US => false,
            MAGIC_US_SWAPPED => true,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "not a pcap file (bad magic)",
                ))
            }
        };
        let network = if big_endian {
            BigEndian::read_u32(&header[20..24])
        } else {
            LittleEndian::read_u32(&header[20..24])
        };
        if network != LINKTYPE_ETHERNET {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "pcap link type is not Ethernet",
            ));
        }
        Ok(PcapReader { reader, big_endian })
    }

    fn read_u32(&self, bytes: &[u8]) -> u32 {
        if self.big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        }
    }

    /// Next record as `(timestamp, frame)`, or `None` at end of file.
    pub fn read_record(&mut self) -> io::Result<Option<(Micros, EthernetPacket)>> {
        let mut header = [0u8; 16];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let ts_sec = self.read_u32(&header[0..4]);
        let ts_usec = self.read_u32(&header[4..8]);
        let incl_len = self.read_u32(&header[8..12]) as usize;

        let mut frame_bytes = vec![0u8; incl_len];
        self.reader.read_exact(&mut frame_bytes)?;

        let mut frame = EthernetPacket::with_max_len(incl_len.max(14));
        frame
            .set_raw(&frame_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Some((
            Micros::from_parts(ts_sec as u64, ts_usec as u64),
            frame,
        )))
    }
}

/// Writes a classic little-endian pcap file.
pub struct PcapWriter {
    writer: BufWriter<File>,
}

impl PcapWriter {
    /// Create the capture file and write the global header.
    pub fn create(path: &Path) -> io::Result<PcapWriter> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_u32::<LittleEndian>(MAGIC_US)?;
        writer.write_u16::<LittleEndian>(VERSION_MAJOR)?;
        writer.write_u16::<LittleEndian>(VERSION_MINOR)?;
        writer.write_u32::<LittleEndian>(0)?; // thiszone
        writer.write_u32::<LittleEndian>(0)?; // sigfigs
        writer.write_u32::<LittleEndian>(SNAPLEN)?;
        writer.write_u32::<LittleEndian>(LINKTYPE_ETHERNET)?;
        Ok(PcapWriter { writer })
    }

    /// Append one frame with its timestamp.
    pub fn write_record(&mut self, time: Micros, frame: &[u8]) -> io::Result<()> {
        let (s, us) = time.parts();
        self.writer.write_u32::<LittleEndian>(s as u32)?;
        self.writer.write_u32::<LittleEndian>(us as u32)?;
        self.writer.write_u32::<LittleEndian>(frame.len() as u32)?;
        self.writer.write_u32::<LittleEndian>(frame.len() as u32)?;
        self.writer.write_all(frame)
    }

    /// Flush everything to disk.
    pub fn finish(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
