//! Wire format of one ring message.
//!
//! A message is a header (`two_sets` flag plus the two pair counts)
//! followed by the source pairs and, when `two_sets` is set, the target
//! pairs, each stream packed in ascending global order. Records are
//! encoded with bincode's fixed-size little-endian layout, so every pair
//! of a given (G, A) instantiation occupies the same number of bytes and
//! buffers can be sized from a single max-reduction of the publish
//! counts. Peers consume only the global index and the attribute of each
//! pair; the local id and public flag travel as opaque metadata.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::error::IdexError;
use crate::index::{Attribute, GlobalIndex};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RingHeader {
    pub two_sets: bool,
    pub source_count: u32,
    pub dest_count: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct WirePair<G, A> {
    pub global: G,
    pub attribute: A,
    pub local: u32,
    pub public: bool,
}

/// Encoded size of the message header.
pub(crate) fn header_bytes() -> Result<usize, IdexError> {
    Ok(bincode::serialized_size(&RingHeader::default())? as usize)
}

/// Encoded size of one index pair of this instantiation.
pub(crate) fn pair_bytes<G: GlobalIndex, A: Attribute>() -> Result<usize, IdexError> {
    Ok(bincode::serialized_size(&WirePair::<G, A>::default())? as usize)
}

/// Buffer capacity sufficient for any peer's message once `max_publish`
/// is the global maximum publish count.
pub(crate) fn message_capacity<G: GlobalIndex, A: Attribute>(
    max_publish: usize,
) -> Result<usize, IdexError> {
    Ok(header_bytes()? + max_publish * pair_bytes::<G, A>()?)
}

/// Pack header and pair streams into `buf`; returns the packed length.
pub(crate) fn pack_message<G, A, I, J>(
    buf: &mut [u8],
    header: &RingHeader,
    source_pairs: I,
    dest_pairs: J,
) -> Result<usize, IdexError>
where
    G: GlobalIndex,
    A: Attribute,
    I: Iterator<Item = WirePair<G, A>>,
    J: Iterator<Item = WirePair<G, A>>,
{
    let mut cursor = Cursor::new(buf);
    bincode::serialize_into(&mut cursor, header)?;
    for pair in source_pairs {
        bincode::serialize_into(&mut cursor, &pair)?;
    }
    for pair in dest_pairs {
        bincode::serialize_into(&mut cursor, &pair)?;
    }
    Ok(cursor.position() as usize)
}

/// Unpack the header from the front of a received message.
pub(crate) fn unpack_header<'b>(
    buf: &'b [u8],
) -> Result<(RingHeader, Cursor<&'b [u8]>), IdexError> {
    let mut cursor = Cursor::new(buf);
    let header: RingHeader = bincode::deserialize_from(&mut cursor)?;
    Ok((header, cursor))
}

/// Unpack `count` pairs from `cursor` into `scratch` (cleared first).
pub(crate) fn unpack_pairs<G: GlobalIndex, A: Attribute>(
    cursor: &mut Cursor<&[u8]>,
    count: usize,
    scratch: &mut Vec<WirePair<G, A>>,
) -> Result<(), IdexError> {
    scratch.clear();
    for _ in 0..count {
        scratch.push(bincode::deserialize_from(&mut *cursor)?);
    }
    Ok(())
}
