use anyhow::{bail, Result};
use bytemuck::Pod;
use safetensors::tensor::Dtype;

/// Element types that can be stored in an [`ArrayStore`](super::ArrayStore).
///
/// Supported: U8, I8, U16, I16, U32, I32, U64, I64, F32, F64.
/// Values are stored in the host byte order, which is little-endian on every
/// platform the container format is read on.
pub trait Element: Pod + Send + Sync {
    /// Container dtype tag for this Rust type.
    const DTYPE: Dtype;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Dtype = Dtype::$dtype;
            }
        )*
    };
}

impl_element!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

pub(crate) fn encode<T: Element>(values: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

/// Decodes raw container bytes. The buffer may be unaligned for `T`.
pub(crate) fn decode<T: Element>(raw: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if raw.len() % size != 0 {
        bail!(
            "Byte length {} is not a multiple of the {:?} element size {}",
            raw.len(),
            T::DTYPE,
            size
        );
    }
    Ok(raw
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}
