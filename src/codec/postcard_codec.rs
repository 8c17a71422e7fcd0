use super::CacheCodec;
use crate::error::CacheFault;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Compact binary codec. Smaller payloads than JSON, worthwhile once the
/// shared tier is network-attached and payload size drives latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostcardCodec;

impl CacheCodec for PostcardCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheFault> {
        postcard::to_allocvec(value).map_err(|e| CacheFault::CodecFault(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheFault> {
        postcard::from_bytes(bytes).map_err(|e| CacheFault::CodecFault(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "postcard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_struct() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }
        let codec = PostcardCodec;
        let bytes = codec.encode(&Point { x: 1, y: 2 }).unwrap();
        let back: Point = codec.decode(&bytes).unwrap();
        assert_eq!(back, Point { x: 1, y: 2 });
    }
}
