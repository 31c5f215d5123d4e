//! Named n-dimensional arrays in a single container file.
//!
//! The container is a safetensors file. Dataset names are hierarchical paths
//! such as `"train/utt1/feats"`; a path prefix that has datasets below it
//! (`"train/utt1"`) behaves as a group.

mod element;

pub use element::Element;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use safetensors::{serialize_to_file, tensor::Dtype, tensor::TensorView, SafeTensors};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and writes array datasets stored in one container file.
///
/// # Example
/// ```ignore
/// let store = ArrayStore::new("dump/train.safetensors");
/// store.write("utt1/feats", &features)?;
///
/// if store.contains("utt1/feats")? {
///     let feats: ArrayD<f32> = store.read("utt1/feats")?;
/// }
///
/// // Refuse to replace existing datasets
/// ArrayStore::new("dump/train.safetensors")
///     .overwrite(false)
///     .write("utt1/feats", &features)?; // error
/// ```
#[derive(Debug, Clone)]
pub struct ArrayStore {
    path: PathBuf,
    // If true, writing an existing dataset replaces it (with a warning).
    // If false, it is an error.
    overwrite: bool,
}

/// Owned copy of one dataset, used while rewriting the container.
struct StoredArray {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl ArrayStore {
    /// Creates a store for the given container file (overwrite enabled).
    /// Nothing is touched on disk until a method is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite: true,
        }
    }

    /// Configures whether `write` may replace an existing dataset.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks whether a dataset or group exists.
    ///
    /// Returns `Ok(false)` when the container file does not exist yet.
    pub fn contains(&self, dataset_path: &str) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let arrays = self.load_all()?;
        if dataset_path.trim_matches('/').is_empty() {
            return Ok(true);
        }
        let name = normalize(dataset_path)?;
        Ok(arrays.contains_key(&name) || is_group(&name, &arrays))
    }

    /// Reads one dataset as an array of `T`.
    ///
    /// Fails if the container or dataset is missing, or if the stored dtype is
    /// not `T`'s.
    pub fn read<T: Element>(&self, dataset_path: &str) -> Result<ArrayD<T>> {
        let name = normalize(dataset_path)?;
        let bytes = self.read_container()?;
        let container = parse(&bytes, &self.path)?;

        let view = container.tensor(&name).map_err(|_| {
            if container.names().iter().any(|n| n.starts_with(&format!("{}/", name))) {
                anyhow!(
                    "'{}' in {} is a group, not a dataset",
                    name,
                    self.path.display()
                )
            } else {
                anyhow!(
                    "Dataset '{}' not found in {}. Check the dataset path.",
                    name,
                    self.path.display()
                )
            }
        })?;

        if view.dtype() != T::DTYPE {
            bail!(
                "Dataset '{}' holds {:?} elements but {:?} was requested",
                name,
                view.dtype(),
                T::DTYPE
            );
        }

        let values = element::decode::<T>(view.data())
            .with_context(|| format!("Failed to decode dataset '{}'", name))?;
        ArrayD::from_shape_vec(IxDyn(view.shape()), values)
            .with_context(|| format!("Dataset '{}' has inconsistent shape {:?}", name, view.shape()))
    }

    /// Writes one dataset, creating the container (and its parent directories)
    /// if needed.
    ///
    /// Existing datasets under other names are kept. Non-contiguous arrays are
    /// stored in logical row-major order.
    pub fn write<T, S, D>(&self, dataset_path: &str, data: &ArrayBase<S, D>) -> Result<()>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let name = normalize(dataset_path)?;
        let mut arrays = if self.path.exists() {
            self.load_all()?
        } else {
            BTreeMap::new()
        };

        if arrays.contains_key(&name) {
            if !self.overwrite {
                bail!(
                    "Dataset '{}' already exists in {}. \
                     Enable overwrite to replace it.",
                    name,
                    self.path.display()
                );
            }
            warn!(
                "Dataset '{}' already exists in {}, replacing it",
                name,
                self.path.display()
            );
        } else if is_group(&name, &arrays) {
            bail!(
                "Cannot create dataset '{}' in {}: a group with that name exists",
                name,
                self.path.display()
            );
        } else if let Some(parent) = ancestors(&name).find(|p| arrays.contains_key(*p)) {
            bail!(
                "Cannot create dataset '{}' in {}: '{}' is a dataset, not a group",
                name,
                self.path.display(),
                parent
            );
        }

        let standard = data.as_standard_layout();
        let values = standard
            .as_slice()
            .context("Array is not contiguous after conversion to standard layout")?;

        arrays.insert(
            name.clone(),
            StoredArray {
                dtype: T::DTYPE,
                shape: data.shape().to_vec(),
                data: element::encode(values),
            },
        );
        self.save_all(&arrays)?;

        debug!(
            "Wrote dataset '{}' {:?} ({:?}) to {}",
            name,
            data.shape(),
            T::DTYPE,
            self.path.display()
        );
        Ok(())
    }

    /// Lists all dataset paths in sorted order.
    pub fn datasets(&self) -> Result<Vec<String>> {
        Ok(self.load_all()?.into_keys().collect())
    }

    /// Deletes a dataset. Returns `Ok(false)` if it did not exist.
    pub fn remove(&self, dataset_path: &str) -> Result<bool> {
        let name = normalize(dataset_path)?;
        let mut arrays = self.load_all()?;
        if arrays.remove(&name).is_none() {
            return Ok(false);
        }
        self.save_all(&arrays)?;
        Ok(true)
    }

    fn read_container(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            bail!(
                "Array container not found: {}. Check the file path.",
                self.path.display()
            );
        }
        fs::read(&self.path)
            .with_context(|| format!("Failed to read array container: {}", self.path.display()))
    }

    fn load_all(&self) -> Result<BTreeMap<String, StoredArray>> {
        let bytes = self.read_container()?;
        let container = parse(&bytes, &self.path)?;

        Ok(container
            .tensors()
            .into_iter()
            .map(|(name, view)| {
                let stored = StoredArray {
                    dtype: view.dtype(),
                    shape: view.shape().to_vec(),
                    data: view.data().to_vec(),
                };
                (name, stored)
            })
            .collect())
    }

    fn save_all(&self, arrays: &BTreeMap<String, StoredArray>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let views = arrays
            .iter()
            .map(|(name, stored)| {
                TensorView::new(stored.dtype, stored.shape.clone(), &stored.data)
                    .map(|view| (name.as_str(), view))
                    .map_err(|e| anyhow!("Invalid dataset '{}': {:?}", name, e))
            })
            .collect::<Result<Vec<_>>>()?;

        serialize_to_file(views, &None, &self.path)
            .with_context(|| format!("Failed to write array container: {}", self.path.display()))
    }
}

fn parse<'a>(bytes: &'a [u8], path: &Path) -> Result<SafeTensors<'a>> {
    SafeTensors::deserialize(bytes)
        .with_context(|| format!("Failed to parse array container: {}", path.display()))
}

/// Strips surrounding slashes and rejects empty segments (`"a//b"`).
fn normalize(dataset_path: &str) -> Result<String> {
    let trimmed = dataset_path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
        bail!("Invalid dataset path: '{}'", dataset_path);
    }
    Ok(trimmed.to_string())
}

fn is_group(name: &str, arrays: &BTreeMap<String, StoredArray>) -> bool {
    let prefix = format!("{}/", name);
    arrays.keys().any(|key| key.starts_with(&prefix))
}

/// `"a/b/c"` -> `"a"`, `"a/b"`
fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('/').map(move |(idx, _)| &name[..idx])
}
