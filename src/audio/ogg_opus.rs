//! Ogg/Opus encapsulation.
//!
//! Binary encoders for the three fixed structures of an Ogg-Opus stream: the
//! Ogg page header, the `OpusHead` identification header, and the `OpusTags`
//! comment header, plus [`OggOpusFramer`] which owns the page-sequence
//! counter and lays encoded packets out into pages.
//!
//! Every multi-byte integer in this module is little-endian. That is a wire
//! format requirement of the Ogg and Opus specifications, not a style choice.

/// Ogg capture pattern, first four bytes of every page.
pub const OGG_CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Fixed size of the Ogg page header before the segment table.
pub const OGG_PAGE_HEADER_LEN: usize = 27;

/// Header-type flag: an ordinary page.
pub const HEADER_TYPE_NORMAL: u8 = 0;
/// Header-type flag: first page of a logical stream.
pub const HEADER_TYPE_BEGINNING_OF_STREAM: u8 = 2;
/// Header-type flag: last page of a logical stream.
pub const HEADER_TYPE_END_OF_STREAM: u8 = 4;

/// Vendor identifier embedded in the comment header. The vendor field on the
/// wire occupies [`VENDOR_FIELD_LEN`] bytes, NUL-padded.
pub const VENDOR: &str = "IBM";

/// On-wire size of the vendor field in the comment header.
const VENDOR_FIELD_LEN: usize = 8;

/// Write an Ogg page header into `buf` at `offset`.
///
/// Writes the 27 fixed bytes plus one segment-table byte per entry of
/// `packet_sizes`; returns the number of bytes written,
/// `27 + packet_sizes.len()`. The page checksum field is written as zero and
/// never computed; strict decoders that verify CRCs will reject these pages.
///
/// # Panics
///
/// Panics if `packet_sizes` has more than 255 entries or `buf` is too small.
pub fn write_ogg_page_header(
    buf: &mut [u8],
    offset: usize,
    header_type: u8,
    granule_position: u64,
    stream_serial: u32,
    page_sequence: u32,
    packet_sizes: &[u8],
) -> usize {
    assert!(packet_sizes.len() <= 255, "segment count exceeds 255");
    let total = OGG_PAGE_HEADER_LEN + packet_sizes.len();
    let out = &mut buf[offset..offset + total];

    out[0..4].copy_from_slice(OGG_CAPTURE_PATTERN);
    out[4] = 0; // stream structure version
    out[5] = header_type;
    out[6..14].copy_from_slice(&granule_position.to_le_bytes());
    out[14..18].copy_from_slice(&stream_serial.to_le_bytes());
    out[18..22].copy_from_slice(&page_sequence.to_le_bytes());
    out[22..26].copy_from_slice(&0u32.to_le_bytes()); // checksum, left zero
    out[26] = packet_sizes.len() as u8;
    out[OGG_PAGE_HEADER_LEN..].copy_from_slice(packet_sizes);

    total
}

/// Build the 19-byte `OpusHead` identification header: mono channel mapping,
/// zero pre-skip, zero output gain.
pub fn build_opus_header(sample_rate: u32) -> [u8; 19] {
    let mut header = [0u8; 19];
    header[0..8].copy_from_slice(b"OpusHead");
    header[8] = 1; // encapsulation version
    header[9] = 1; // channel count
    header[10..12].copy_from_slice(&0u16.to_le_bytes()); // pre-skip
    header[12..16].copy_from_slice(&sample_rate.to_le_bytes());
    header[16..18].copy_from_slice(&0u16.to_le_bytes()); // output gain
    header[18] = 0; // channel mapping family
    header
}

/// Build the `OpusTags` comment header with a single user comment.
///
/// Layout: magic (8), vendor length (4), vendor field
/// ([`VENDOR_FIELD_LEN`] bytes, [`VENDOR`] NUL-padded), comment count (4),
/// comment length (4), comment bytes. Total length is `28 + comment.len()`.
pub fn build_opus_comment(comment: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(28 + comment.len());
    out.extend_from_slice(b"OpusTags");
    out.extend_from_slice(&(VENDOR_FIELD_LEN as u32).to_le_bytes());
    let mut vendor = [0u8; VENDOR_FIELD_LEN];
    vendor[..VENDOR.len()].copy_from_slice(VENDOR.as_bytes());
    out.extend_from_slice(&vendor);
    out.extend_from_slice(&1u32.to_le_bytes()); // user comment count
    out.extend_from_slice(&(comment.len() as u32).to_le_bytes());
    out.extend_from_slice(comment.as_bytes());
    out
}

/// Segment-table lacing values for one packet: 255 for each full segment,
/// then the remainder (a packet of exactly `n * 255` bytes ends with a 0).
fn lacing_values(len: usize, out: &mut Vec<u8>) {
    let mut remaining = len;
    while remaining >= 255 {
        out.push(255);
        remaining -= 255;
    }
    out.push(remaining as u8);
}

/// Frames encoded Opus packets into Ogg pages.
///
/// Owns the page-sequence counter for one logical stream; the sequence number
/// strictly increases with every page emitted.
#[derive(Debug)]
pub struct OggOpusFramer {
    stream_serial: u32,
    page_sequence: u32,
}

impl OggOpusFramer {
    pub fn new(stream_serial: u32) -> Self {
        Self {
            stream_serial,
            page_sequence: 0,
        }
    }

    /// Pages emitted so far.
    pub fn page_sequence(&self) -> u32 {
        self.page_sequence
    }

    fn page(&mut self, header_type: u8, granule_position: u64, packets: &[&[u8]]) -> Vec<u8> {
        let mut sizes = Vec::new();
        for packet in packets {
            lacing_values(packet.len(), &mut sizes);
        }
        let body_len: usize = packets.iter().map(|p| p.len()).sum();
        let mut out = vec![0u8; OGG_PAGE_HEADER_LEN + sizes.len() + body_len];
        let written = write_ogg_page_header(
            &mut out,
            0,
            header_type,
            granule_position,
            self.stream_serial,
            self.page_sequence,
            &sizes,
        );
        let mut at = written;
        for packet in packets {
            out[at..at + packet.len()].copy_from_slice(packet);
            at += packet.len();
        }
        self.page_sequence += 1;
        out
    }

    /// First page of the stream: the `OpusHead` packet with the
    /// beginning-of-stream flag.
    pub fn id_header_page(&mut self, sample_rate: u32) -> Vec<u8> {
        let head = build_opus_header(sample_rate);
        self.page(HEADER_TYPE_BEGINNING_OF_STREAM, 0, &[&head])
    }

    /// Second page of the stream: the `OpusTags` packet.
    pub fn comment_header_page(&mut self, comment: &str) -> Vec<u8> {
        let tags = build_opus_comment(comment);
        self.page(HEADER_TYPE_NORMAL, 0, &[&tags])
    }

    /// An audio page carrying one or more encoded packets.
    pub fn audio_page(
        &mut self,
        packets: &[&[u8]],
        granule_position: u64,
        end_of_stream: bool,
    ) -> Vec<u8> {
        let header_type = if end_of_stream {
            HEADER_TYPE_END_OF_STREAM
        } else {
            HEADER_TYPE_NORMAL
        };
        self.page(header_type, granule_position, packets)
    }
}
