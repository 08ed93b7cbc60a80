//! Binary and ASCII file formats for grids and models.
//!
//! Both formats carry the same fields in the same order. Binary files are
//! big-endian; ASCII files hold one record per line. The format of a file
//! being read is detected from the byte that follows the magic string, the
//! format of a file being written from its extension (`.ascii` selects text).
//!
//! ```text
//! GEOTESSMODEL  version  header  profiles[vertex][layer]  grid-file  grid-id  [grid]
//! GEOTESSGRID   version  header  tessellations  levels  vertices  triangles
//! ```
//!
//! A model either embeds its grid (grid file `"*"`) or names a grid file in
//! the same directory whose id must match the one recorded in the model.

mod ascii;
mod binary;

pub use ascii::TextReader;

use crate::cache::GridCache;
use crate::config::GeoTessConfig;
use crate::data::{CustomData, DataType};
use crate::error::{GeoTessError, Result};
use crate::geometry::EarthShape;
use crate::grid::Grid;
use crate::metadata::MetaData;
use crate::model::Model;
use crate::profile::Profile;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub(crate) const GRID_MAGIC: &str = "GEOTESSGRID";
pub(crate) const MODEL_MAGIC: &str = "GEOTESSMODEL";
pub(crate) const FORMAT_VERSION: i32 = 2;

/// Grid file name recorded by models that embed their grid.
pub const EMBEDDED_GRID: &str = "*";

/// Reads and writes one caller-defined data kind.
///
/// Registered in a [`CodecRegistry`] under [`CustomDataCodec::type_name`],
/// which must match the `type_name()` of the values it produces.
pub trait CustomDataCodec: Send + Sync {
    fn type_name(&self) -> &str;

    /// Decode one node value. `attribute_count` comes from the model header.
    fn read_binary(&self, buf: &mut Bytes, attribute_count: usize) -> Result<Arc<dyn CustomData>>;

    fn write_binary(&self, data: &dyn CustomData, out: &mut BytesMut) -> Result<()>;

    /// Decode one node value from whitespace-separated tokens.
    fn read_ascii(
        &self,
        reader: &mut TextReader<'_>,
        attribute_count: usize,
    ) -> Result<Arc<dyn CustomData>>;

    /// Append the tokens of one node value, without a trailing newline.
    fn write_ascii(&self, data: &dyn CustomData, out: &mut String) -> Result<()>;

    /// Encoded binary size of `data` in bytes.
    fn size(&self, data: &dyn CustomData) -> usize;
}

/// Custom data codecs keyed by type name.
///
/// A registry is an ordinary value: build one, register codecs, and hand it to
/// the read and write calls that need it.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn CustomDataCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec, replacing any codec with the same type name.
    pub fn register(&mut self, codec: Arc<dyn CustomDataCodec>) -> &mut Self {
        self.codecs.insert(codec.type_name().to_string(), codec);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn CustomDataCodec>> {
        self.codecs.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    fn codec_for(&self, data: &dyn CustomData) -> Result<&Arc<dyn CustomDataCodec>> {
        self.get(data.type_name())
            .ok_or_else(|| GeoTessError::unknown_data_type(data.type_name()))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.codecs.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}

/// On-disk representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Binary,
    Ascii,
}

impl FileFormat {
    /// `.ascii` files are text, everything else binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ascii") => Self::Ascii,
            _ => Self::Binary,
        }
    }

    /// Detect the format of `bytes` that start with `magic`.
    fn sniff(bytes: &[u8], magic: &str) -> Option<Self> {
        let rest = bytes.strip_prefix(magic.as_bytes())?;
        match rest.first() {
            Some(b'\n') | Some(b'\r') => Some(Self::Ascii),
            Some(_) => Some(Self::Binary),
            None => None,
        }
    }
}

/// Which kind of file a reader is decoding; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Grid,
    Model,
}

impl Section {
    pub(crate) fn error(self, msg: impl Into<String>) -> GeoTessError {
        match self {
            Self::Grid => GeoTessError::malformed_grid(msg),
            Self::Model => GeoTessError::malformed_model(msg),
        }
    }
}

/// Decoder for the node values of one model.
#[derive(Clone)]
pub(crate) enum DataCodec {
    Numeric(DataType),
    Custom(Arc<dyn CustomDataCodec>),
}

impl DataCodec {
    fn resolve(metadata: &MetaData, registry: &CodecRegistry) -> Result<Self> {
        match metadata.data_type() {
            DataType::Custom => {
                let name = metadata.data_type_name();
                registry
                    .get(name)
                    .cloned()
                    .map(Self::Custom)
                    .ok_or_else(|| GeoTessError::unknown_data_type(name))
            }
            dt => Ok(Self::Numeric(dt)),
        }
    }
}

/// Model header fields in file order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Header {
    pub software_version: String,
    pub generation_date: String,
    pub earth_shape: String,
    pub description: String,
    pub attribute_names: String,
    pub attribute_units: String,
    pub layer_names: String,
    pub data_type: String,
    pub vertex_count: usize,
    pub layer_tess_ids: Vec<usize>,
}

impl Header {
    fn from_model(model: &Model) -> Self {
        let md = model.metadata();
        Self {
            software_version: md.model_software_version().to_string(),
            generation_date: md.model_generation_date().to_string(),
            earth_shape: md.earth_shape().as_str().to_string(),
            description: md.description().to_string(),
            attribute_names: md.attribute_names_string(),
            attribute_units: md.attribute_units_string(),
            layer_names: md.layer_names_string(),
            data_type: md.data_type_name().to_string(),
            vertex_count: model.vertex_count(),
            layer_tess_ids: md.layer_tess_ids().to_vec(),
        }
    }

    /// Build the metadata and the node decoder the header describes.
    fn prepare(self, registry: &CodecRegistry, config: &GeoTessConfig) -> Result<(MetaData, DataCodec)> {
        let metadata = self.into_metadata(config)?;
        let codec = DataCodec::resolve(&metadata, registry)?;
        Ok((metadata, codec))
    }

    fn into_metadata(self, config: &GeoTessConfig) -> Result<MetaData> {
        let mut md = MetaData::new();
        md.set_model_software_version(self.software_version);
        md.set_model_generation_date(self.generation_date);
        md.set_earth_shape(if self.earth_shape.trim().is_empty() {
            config.earth_shape
        } else {
            EarthShape::from_str(self.earth_shape.trim())
        });
        md.set_description(self.description);
        md.set_attributes_str(&self.attribute_names, &self.attribute_units)?;
        let layers: Vec<&str> = self.layer_names.split(';').collect();
        md.set_layer_names(&layers)?;
        if self.layer_tess_ids.len() != layers.len() {
            return Err(GeoTessError::malformed_model(format!(
                "{} layer tessellation ids for {} layers",
                self.layer_tess_ids.len(),
                layers.len()
            )));
        }
        md.set_layer_tess_ids(self.layer_tess_ids)?;
        match DataType::from_str(&self.data_type) {
            DataType::Custom => md.set_custom_data_type(self.data_type.trim()),
            dt => md.set_data_type(dt),
        }
        Ok(md)
    }
}

/// Everything decoded from a model file before its grid is resolved.
pub(crate) struct ModelParts {
    pub metadata: MetaData,
    pub vertex_count: usize,
    /// `[vertex][layer]`
    pub profiles: Vec<Vec<Profile>>,
    pub grid_file: String,
    pub grid_id: String,
    pub grid: Option<Grid>,
}

// ----------------------------------------------------------------------
// Grids
// ----------------------------------------------------------------------

/// Encode a grid.
pub fn encode_grid(grid: &Grid, format: FileFormat) -> Result<Bytes> {
    match format {
        FileFormat::Binary => {
            let mut out = BytesMut::with_capacity(binary::grid_size(grid));
            binary::encode_grid(grid, &mut out);
            Ok(out.freeze())
        }
        FileFormat::Ascii => {
            let mut out = String::new();
            ascii::encode_grid(grid, &mut out)?;
            Ok(Bytes::from(out))
        }
    }
}

/// Decode a grid file, or the embedded grid of a model file.
pub fn decode_grid(bytes: impl Into<Bytes>) -> Result<Grid> {
    decode_grid_in(bytes.into(), None)
}

fn decode_grid_in(bytes: Bytes, base_dir: Option<&Path>) -> Result<Grid> {
    if let Some(format) = FileFormat::sniff(&bytes, GRID_MAGIC) {
        return match format {
            FileFormat::Binary => binary::decode_grid(bytes),
            FileFormat::Ascii => ascii::decode_grid(utf8(&bytes, Section::Grid)?),
        };
    }
    if FileFormat::sniff(&bytes, MODEL_MAGIC).is_some() {
        let parts = decode_model_parts(bytes, &CodecRegistry::new(), &GeoTessConfig::default())?;
        return match parts.grid {
            Some(grid) => Ok(grid),
            None => {
                let dir = base_dir.ok_or_else(|| {
                    GeoTessError::malformed_grid(format!(
                        "model references grid file {} and no directory to resolve it",
                        parts.grid_file
                    ))
                })?;
                read_grid_file(&dir.join(&parts.grid_file))
            }
        };
    }
    Err(GeoTessError::malformed_grid(
        "not a grid file: missing GEOTESSGRID or GEOTESSMODEL magic",
    ))
}

/// Read a binary or ASCII grid file. Model files yield their grid.
pub fn read_grid_file(path: &Path) -> Result<Grid> {
    let started = Instant::now();
    let bytes = Bytes::from(std::fs::read(path)?);
    let mut grid = decode_grid_in(bytes, path.parent())?;
    grid.set_input_file(path.to_path_buf());
    info!(
        path = %path.display(),
        grid_id = %grid.grid_id(),
        vertices = grid.vertex_count(),
        triangles = grid.triangle_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Grid loaded"
    );
    Ok(grid)
}

/// Write a grid; the format follows the file extension.
pub fn write_grid_file(grid: &Grid, path: &Path) -> Result<()> {
    let bytes = encode_grid(grid, FileFormat::from_path(path))?;
    std::fs::write(path, &bytes)?;
    debug!(path = %path.display(), grid_id = %grid.grid_id(), bytes = bytes.len(), "Grid written");
    Ok(())
}

// ----------------------------------------------------------------------
// Models
// ----------------------------------------------------------------------

/// Encode a model. `grid_file` names a separate grid file; `None` embeds
/// the grid.
pub fn encode_model(
    model: &Model,
    format: FileFormat,
    grid_file: Option<&str>,
    registry: &CodecRegistry,
) -> Result<Bytes> {
    let grid_file = grid_file.unwrap_or(EMBEDDED_GRID);
    if grid_file.trim().is_empty() || grid_file.contains('\n') {
        return Err(GeoTessError::invalid_argument(format!(
            "invalid grid file name {:?}",
            grid_file
        )));
    }
    let header = Header::from_model(model);
    match format {
        FileFormat::Binary => {
            let mut out = BytesMut::new();
            binary::encode_model(model, &header, grid_file, registry, &mut out)?;
            Ok(out.freeze())
        }
        FileFormat::Ascii => {
            let mut out = String::new();
            ascii::encode_model(model, &header, grid_file, registry, &mut out)?;
            Ok(Bytes::from(out))
        }
    }
}


/// Decode a model. A referenced grid file is resolved against `base_dir`.
pub fn decode_model(
    bytes: impl Into<Bytes>,
    base_dir: Option<&Path>,
    registry: &CodecRegistry,
    config: &GeoTessConfig,
) -> Result<Model> {
    let mut parts = decode_model_parts(bytes.into(), registry, config)?;
    let grid = resolve_grid(&mut parts, base_dir, config)?;
    assemble(grid, parts)
}

fn decode_model_parts(
    bytes: Bytes,
    registry: &CodecRegistry,
    config: &GeoTessConfig,
) -> Result<ModelParts> {
    match FileFormat::sniff(&bytes, MODEL_MAGIC) {
        Some(FileFormat::Binary) => binary::decode_model(bytes, registry, config),
        Some(FileFormat::Ascii) => ascii::decode_model(utf8(&bytes, Section::Model)?, registry, config),
        None => Err(GeoTessError::malformed_model(
            "not a model file: missing GEOTESSMODEL magic",
        )),
    }
}

/// Take the embedded grid or load the referenced one, and check its id.
fn resolve_grid(
    parts: &mut ModelParts,
    base_dir: Option<&Path>,
    config: &GeoTessConfig,
) -> Result<Arc<Grid>> {
    let grid = match parts.grid.take() {
        Some(grid) if config.grid_reuse => GridCache::global().share(grid),
        Some(grid) => Arc::new(grid),
        None => {
            let dir = base_dir.ok_or_else(|| {
                GeoTessError::malformed_model(format!(
                    "model references grid file {} and no directory to resolve it",
                    parts.grid_file
                ))
            })?;
            let path: PathBuf = dir.join(&parts.grid_file);
            if config.grid_reuse {
                GridCache::global().get_or_load(&path)?
            } else {
                Arc::new(read_grid_file(&path)?)
            }
        }
    };
    if grid.grid_id() != parts.grid_id {
        return Err(GeoTessError::malformed_model(format!(
            "grid {} has id {} but the model expects {}",
            parts.grid_file,
            grid.grid_id(),
            parts.grid_id
        )));
    }
    Ok(grid)
}

fn assemble(grid: Arc<Grid>, parts: ModelParts) -> Result<Model> {
    if parts.vertex_count != grid.vertex_count() {
        return Err(GeoTessError::malformed_model(format!(
            "model has profiles for {} vertices but grid {} has {}",
            parts.vertex_count,
            grid.grid_id(),
            grid.vertex_count()
        )));
    }
    let mut model = Model::new(grid, parts.metadata)?;
    for (vertex, profiles) in parts.profiles.into_iter().enumerate() {
        for (layer, profile) in profiles.into_iter().enumerate() {
            model.set_profile(vertex, layer, profile)?;
        }
    }
    Ok(model)
}

/// Read a binary or ASCII model file.
pub fn read_model_file(
    path: &Path,
    registry: &CodecRegistry,
    config: &GeoTessConfig,
) -> Result<Model> {
    let started = Instant::now();
    let bytes = Bytes::from(std::fs::read(path)?);
    let mut model = decode_model(bytes, path.parent(), registry, config)?;
    model.set_input_file(path.to_path_buf());
    info!(
        path = %path.display(),
        grid_id = %model.grid().grid_id(),
        vertices = model.vertex_count(),
        layers = model.layer_count(),
        data_type = %model.metadata().data_type_name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model loaded"
    );
    Ok(model)
}

/// Write a model; the format follows the file extension.
///
/// With a `grid_file` the grid is stored next to the model under that name,
/// and written only when no such file exists yet.
pub fn write_model_file(
    model: &Model,
    path: &Path,
    grid_file: Option<&str>,
    registry: &CodecRegistry,
) -> Result<()> {
    let grid_file = grid_file.filter(|name| *name != EMBEDDED_GRID);
    if let Some(name) = grid_file {
        let grid_path = match path.parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        };
        if !grid_path.exists() {
            write_grid_file(model.grid(), &grid_path)?;
        }
    }
    let bytes = encode_model(model, FileFormat::from_path(path), grid_file, registry)?;
    std::fs::write(path, &bytes)?;
    info!(
        path = %path.display(),
        grid_file = grid_file.unwrap_or(EMBEDDED_GRID),
        bytes = bytes.len(),
        "Model written"
    );
    Ok(())
}

fn utf8(bytes: &[u8], section: Section) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| section.error(format!("ASCII file is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;
    use crate::testdata;

    #[test]
    fn test_sniff_format() {
        assert_eq!(
            FileFormat::sniff(b"GEOTESSGRID\n2\n", GRID_MAGIC),
            Some(FileFormat::Ascii)
        );
        assert_eq!(
            FileFormat::sniff(b"GEOTESSGRID\0\0\0\x02", GRID_MAGIC),
            Some(FileFormat::Binary)
        );
        assert_eq!(FileFormat::sniff(b"GEOTESSGRID", GRID_MAGIC), None);
        assert_eq!(FileFormat::sniff(b"GEOTESSMODEL\n", GRID_MAGIC), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a/model.ascii")), FileFormat::Ascii);
        assert_eq!(FileFormat::from_path(Path::new("a/model.ASCII")), FileFormat::Ascii);
        assert_eq!(FileFormat::from_path(Path::new("a/model.geotess")), FileFormat::Binary);
        assert_eq!(FileFormat::from_path(Path::new("grid")), FileFormat::Binary);
    }

    #[test]
    fn test_grid_round_trip() {
        let grid = GridBuilder::icosahedral(2).unwrap();
        for format in [FileFormat::Binary, FileFormat::Ascii] {
            let bytes = encode_grid(&grid, format).unwrap();
            let back = decode_grid(bytes.clone()).unwrap();
            assert_eq!(back, grid);
            assert_eq!(back.grid_id(), grid.grid_id());
            assert_eq!(encode_grid(&back, format).unwrap(), bytes);
        }
    }

    #[test]
    fn test_model_round_trip_embedded() {
        let model = testdata::crust_model();
        let config = GeoTessConfig {
            grid_reuse: false,
            ..Default::default()
        };
        for format in [FileFormat::Binary, FileFormat::Ascii] {
            let bytes = encode_model(&model, format, None, &CodecRegistry::new()).unwrap();
            let back = decode_model(bytes.clone(), None, &CodecRegistry::new(), &config).unwrap();
            assert_eq!(back, model);
            let again = encode_model(&back, format, None, &CodecRegistry::new()).unwrap();
            assert_eq!(again, bytes);
        }
    }

    #[test]
    fn test_grid_from_model_bytes() {
        let model = testdata::surface_model();
        let bytes = encode_model(&model, FileFormat::Binary, None, &CodecRegistry::new()).unwrap();
        let grid = decode_grid(bytes).unwrap();
        assert_eq!(grid.grid_id(), model.grid().grid_id());
    }

    #[test]
    fn test_referenced_grid_needs_directory() {
        let model = testdata::surface_model();
        let bytes =
            encode_model(&model, FileFormat::Binary, Some("grid.geotess"), &CodecRegistry::new())
                .unwrap();
        let err = decode_model(bytes, None, &CodecRegistry::new(), &GeoTessConfig::default())
            .unwrap_err();
        assert!(matches!(err, GeoTessError::MalformedModel(_)));
    }

    #[test]
    fn test_bad_magic() {
        let err = decode_grid(Bytes::from_static(b"NOTAGRID")).unwrap_err();
        assert!(matches!(err, GeoTessError::MalformedGrid(_)));
        let err = decode_model(
            Bytes::from_static(b"GEOTESSGRID\n"),
            None,
            &CodecRegistry::new(),
            &GeoTessConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GeoTessError::MalformedModel(_)));
    }

    #[test]
    fn test_invalid_grid_file_name() {
        let model = testdata::surface_model();
        let err = encode_model(&model, FileFormat::Binary, Some(" "), &CodecRegistry::new())
            .unwrap_err();
        assert!(matches!(err, GeoTessError::InvalidArgument(_)));
    }
}
