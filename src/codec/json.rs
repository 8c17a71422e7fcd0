use super::CacheCodec;
use crate::error::CacheFault;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default codec. Human-readable on the wire, useful for debugging a live
/// shared tier with a plain Redis client.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheFault> {
        serde_json::to_vec(value).map_err(|e| CacheFault::CodecFault(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheFault> {
        serde_json::from_slice(bytes).map_err(|e| CacheFault::CodecFault(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
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
        let codec = JsonCodec;
        let bytes = codec.encode(&Point { x: 1, y: 2 }).unwrap();
        let back: Point = codec.decode(&bytes).unwrap();
        assert_eq!(back, Point { x: 1, y: 2 });
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = JsonCodec;
        let err = codec.decode::<i32>(b"not json").unwrap_err();
        assert!(matches!(err, CacheFault::CodecFault(_)));
    }
}
