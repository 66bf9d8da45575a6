use bytes::Bytes;
use sealer_core::{SessionId, Upload};
use sealer_storage::UploadStore;

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Create an upload with `count` seeded parts numbered from 1.
///
/// Returns the upload as recorded by the store and the expected recording.
pub async fn upload_with_parts(store: &dyn UploadStore, count: u32) -> (Upload, Vec<u8>) {
    let mut upload = store.create_upload(SessionId::new()).await.unwrap();
    let mut expected = Vec::new();
    for number in 1..=count {
        let data = seeded_bytes(u64::from(number), 1000 + number as usize);
        expected.extend_from_slice(&data);
        store.upload_part(&upload, number, data).await.unwrap();
    }
    upload = store.get_upload(upload.id).await.unwrap();
    (upload, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(42, 1000);
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_seeded_bytes_different_seeds() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(43, 1000);
        assert_ne!(data1, data2);
    }
}
