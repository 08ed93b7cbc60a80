//! Big-endian binary encoding.

use super::{
    CodecRegistry, DataCodec, Header, ModelParts, Section, FORMAT_VERSION, GRID_MAGIC, MODEL_MAGIC,
};
use crate::config::GeoTessConfig;
use crate::data::{Data, DataType};
use crate::error::Result;
use crate::grid::Grid;
use crate::model::Model;
use crate::profile::{Profile, ProfileType};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Cursor over an encoded buffer with bounds-checked reads.
struct Reader {
    buf: Bytes,
    section: Section,
}

impl Reader {
    fn new(buf: Bytes, section: Section) -> Self {
        Self { buf, section }
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(self.section.error(format!(
                "unexpected end of file reading {} ({} bytes needed, {} left)",
                what,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn magic(&mut self, magic: &str) -> Result<()> {
        self.need(magic.len(), "magic")?;
        if &self.buf[..magic.len()] != magic.as_bytes() {
            return Err(self.section.error(format!("missing {} magic", magic)));
        }
        self.buf.advance(magic.len());
        let version = self.i32("format version")?;
        if version != FORMAT_VERSION {
            return Err(self
                .section
                .error(format!("unsupported {} format version {}", magic, version)));
        }
        Ok(())
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    fn f32(&mut self, what: &str) -> Result<f32> {
        self.need(4, what)?;
        Ok(self.buf.get_f32())
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        self.need(8, what)?;
        Ok(self.buf.get_f64())
    }

    /// Non-negative `i32` as an index or count.
    fn index(&mut self, what: &str) -> Result<usize> {
        let v = self.i32(what)?;
        usize::try_from(v).map_err(|_| self.section.error(format!("negative {}: {}", what, v)))
    }

    /// `i32` byte length followed by the bytes.
    fn string(&mut self, what: &str) -> Result<String> {
        let n = self.index(what)?;
        self.need(n, what)?;
        let bytes = self.buf.split_to(n);
        String::from_utf8(bytes.to_vec())
            .map_err(|_| self.section.error(format!("{} is not valid UTF-8", what)))
    }

    fn pairs(&mut self, n: usize, what: &str) -> Result<Vec<[usize; 2]>> {
        self.need(n * 8, what)?;
        (0..n)
            .map(|_| Ok([self.index(what)?, self.index(what)?]))
            .collect()
    }
}

fn put_string(out: &mut BytesMut, s: &str) {
    out.put_i32(s.len() as i32);
    out.put_slice(s.as_bytes());
}

// ----------------------------------------------------------------------
// Grid
// ----------------------------------------------------------------------

/// Exact encoded size of a grid.
pub(super) fn grid_size(grid: &Grid) -> usize {
    GRID_MAGIC.len()
        + 4
        + 12
        + grid.software_version().len()
        + grid.generation_date().len()
        + grid.grid_id().len()
        + 16
        + 8 * (grid.tessellation_count() + grid.total_level_count())
        + 24 * grid.vertex_count()
        + 12 * grid.triangle_count()
}

pub(super) fn encode_grid(grid: &Grid, out: &mut BytesMut) {
    out.put_slice(GRID_MAGIC.as_bytes());
    out.put_i32(FORMAT_VERSION);
    put_string(out, grid.software_version());
    put_string(out, grid.generation_date());
    put_string(out, grid.grid_id());

    out.put_i32(grid.tessellation_count() as i32);
    out.put_i32(grid.total_level_count() as i32);
    out.put_i32(grid.triangle_count() as i32);
    out.put_i32(grid.vertex_count() as i32);

    for pair in grid.tessellation_ranges().iter().chain(grid.level_ranges()) {
        out.put_i32(pair[0] as i32);
        out.put_i32(pair[1] as i32);
    }
    for v in grid.vertices() {
        for &x in v {
            out.put_f64(x);
        }
    }
    for tri in grid.triangles() {
        for &v in tri {
            out.put_i32(v as i32);
        }
    }
}

pub(super) fn decode_grid(buf: Bytes) -> Result<Grid> {
    let mut r = Reader::new(buf, Section::Grid);
    read_grid(&mut r)
}

fn read_grid(r: &mut Reader) -> Result<Grid> {
    r.section = Section::Grid;
    r.magic(GRID_MAGIC)?;
    let software_version = r.string("software version")?;
    let generation_date = r.string("generation date")?;
    let grid_id = r.string("grid id")?;

    let n_tess = r.index("tessellation count")?;
    let n_levels = r.index("level count")?;
    let n_triangles = r.index("triangle count")?;
    let n_vertices = r.index("vertex count")?;

    let tessellations = r.pairs(n_tess, "tessellation range")?;
    let levels = r.pairs(n_levels, "level range")?;

    r.need(n_vertices * 24, "vertices")?;
    let vertices = (0..n_vertices)
        .map(|_| Ok([r.f64("vertex")?, r.f64("vertex")?, r.f64("vertex")?]))
        .collect::<Result<Vec<_>>>()?;

    r.need(n_triangles * 12, "triangles")?;
    let triangles = (0..n_triangles)
        .map(|_| Ok([r.index("triangle")?, r.index("triangle")?, r.index("triangle")?]))
        .collect::<Result<Vec<_>>>()?;

    let grid = Grid::from_parts(
        tessellations,
        levels,
        vertices,
        triangles,
        software_version,
        generation_date,
        Some(grid_id),
    )?;
    grid.test_grid()?;
    Ok(grid)
}

// ----------------------------------------------------------------------
// Model
// ----------------------------------------------------------------------

pub(super) fn encode_model(
    model: &Model,
    header: &Header,
    grid_file: &str,
    registry: &CodecRegistry,
    out: &mut BytesMut,
) -> Result<()> {
    out.put_slice(MODEL_MAGIC.as_bytes());
    out.put_i32(FORMAT_VERSION);
    put_string(out, &header.software_version);
    put_string(out, &header.generation_date);
    put_string(out, &header.earth_shape);
    put_string(out, &header.description);
    put_string(out, &header.attribute_names);
    put_string(out, &header.attribute_units);
    put_string(out, &header.layer_names);
    put_string(out, &header.data_type);
    out.put_i32(header.vertex_count as i32);
    for &tess in &header.layer_tess_ids {
        out.put_i32(tess as i32);
    }

    for profiles in model.all_profiles() {
        for profile in profiles {
            write_profile(profile, registry, out)?;
        }
    }

    put_string(out, grid_file);
    put_string(out, model.grid().grid_id());
    if grid_file == super::EMBEDDED_GRID {
        out.reserve(grid_size(model.grid()));
        encode_grid(model.grid(), out);
    }
    Ok(())
}

fn write_profile(profile: &Profile, registry: &CodecRegistry, out: &mut BytesMut) -> Result<()> {
    out.put_u8(profile.profile_type().ordinal());
    match profile {
        Profile::Empty {
            radius_bottom,
            radius_top,
        } => {
            out.put_f32(*radius_bottom);
            out.put_f32(*radius_top);
        }
        Profile::Thin { radius, data } => {
            out.put_f32(*radius);
            write_data(data, registry, out)?;
        }
        Profile::Constant {
            radius_bottom,
            radius_top,
            data,
        } => {
            out.put_f32(*radius_bottom);
            out.put_f32(*radius_top);
            write_data(data, registry, out)?;
        }
        Profile::NPoint { radii, data, .. } => {
            out.put_i32(radii.len() as i32);
            for (r, d) in radii.iter().zip(data) {
                out.put_f32(*r);
                write_data(d, registry, out)?;
            }
        }
        Profile::Surface { data } => write_data(data, registry, out)?,
        Profile::SurfaceEmpty => {}
    }
    Ok(())
}

fn write_data(data: &Data, registry: &CodecRegistry, out: &mut BytesMut) -> Result<()> {
    match data {
        Data::F64(v) => v.iter().for_each(|&x| out.put_f64(x)),
        Data::F32(v) => v.iter().for_each(|&x| out.put_f32(x)),
        Data::I64(v) => v.iter().for_each(|&x| out.put_i64(x)),
        Data::I32(v) => v.iter().for_each(|&x| out.put_i32(x)),
        Data::I16(v) => v.iter().for_each(|&x| out.put_i16(x)),
        Data::I8(v) => v.iter().for_each(|&x| out.put_i8(x)),
        Data::Custom(c) => {
            let codec = registry.codec_for(c.as_ref())?;
            out.reserve(codec.size(c.as_ref()));
            codec.write_binary(c.as_ref(), out)?;
        }
    }
    Ok(())
}

pub(super) fn decode_model(
    buf: Bytes,
    registry: &CodecRegistry,
    config: &GeoTessConfig,
) -> Result<ModelParts> {
    let mut r = Reader::new(buf, Section::Model);
    r.magic(MODEL_MAGIC)?;

    let mut header = Header {
        software_version: r.string("software version")?,
        generation_date: r.string("generation date")?,
        earth_shape: r.string("earth shape")?,
        description: r.string("description")?,
        attribute_names: r.string("attribute names")?,
        attribute_units: r.string("attribute units")?,
        layer_names: r.string("layer names")?,
        data_type: r.string("data type")?,
        vertex_count: r.index("vertex count")?,
        layer_tess_ids: Vec::new(),
    };
    let layer_count = header.layer_names.split(';').count();
    header.layer_tess_ids = (0..layer_count)
        .map(|_| r.index("layer tessellation"))
        .collect::<Result<_>>()?;
    let vertex_count = header.vertex_count;

    let (metadata, codec) = header.prepare(registry, config)?;
    let attribute_count = metadata.attribute_count();

    let mut profiles = Vec::with_capacity(vertex_count.min(r.buf.remaining()));
    for _ in 0..vertex_count {
        let layers = (0..layer_count)
            .map(|_| read_profile(&mut r, &codec, attribute_count))
            .collect::<Result<Vec<_>>>()?;
        profiles.push(layers);
    }

    let grid_file = r.string("grid file name")?;
    let grid_id = r.string("grid id")?;
    let grid = if grid_file == super::EMBEDDED_GRID {
        Some(read_grid(&mut r)?)
    } else {
        None
    };

    Ok(ModelParts {
        metadata,
        vertex_count,
        profiles,
        grid_file,
        grid_id,
        grid,
    })
}

fn read_profile(r: &mut Reader, codec: &DataCodec, attribute_count: usize) -> Result<Profile> {
    let ordinal = r.u8("profile type")?;
    let kind = ProfileType::from_ordinal(ordinal)
        .ok_or_else(|| r.section.error(format!("unknown profile type {}", ordinal)))?;
    match kind {
        ProfileType::Empty => {
            let bottom = r.f32("radius")?;
            let top = r.f32("radius")?;
            Profile::empty(bottom, top)
        }
        ProfileType::Thin => {
            let radius = r.f32("radius")?;
            Ok(Profile::thin(radius, read_data(r, codec, attribute_count)?))
        }
        ProfileType::Constant => {
            let bottom = r.f32("radius")?;
            let top = r.f32("radius")?;
            Profile::constant(bottom, top, read_data(r, codec, attribute_count)?)
        }
        ProfileType::NPoint => {
            let n = r.index("node count")?;
            r.need(n * 4, "profile nodes")?;
            let mut radii = Vec::with_capacity(n);
            let mut data = Vec::with_capacity(n);
            for _ in 0..n {
                radii.push(r.f32("radius")?);
                data.push(read_data(r, codec, attribute_count)?);
            }
            Profile::npoint(radii, data)
        }
        ProfileType::Surface => Ok(Profile::surface(read_data(r, codec, attribute_count)?)),
        ProfileType::SurfaceEmpty => Ok(Profile::SurfaceEmpty),
    }
}

fn read_data(r: &mut Reader, codec: &DataCodec, n: usize) -> Result<Data> {
    let dt = match codec {
        DataCodec::Custom(custom) => {
            return Ok(Data::Custom(custom.read_binary(&mut r.buf, n)?));
        }
        DataCodec::Numeric(dt) => *dt,
    };
    r.need(n * dt.size_of(), "node data")?;
    Ok(match dt {
        DataType::Double => Data::F64((0..n).map(|_| r.buf.get_f64()).collect()),
        DataType::Float => Data::F32((0..n).map(|_| r.buf.get_f32()).collect()),
        DataType::Long => Data::I64((0..n).map(|_| r.buf.get_i64()).collect()),
        DataType::Int => Data::I32((0..n).map(|_| r.buf.get_i32()).collect()),
        DataType::Short => Data::I16((0..n).map(|_| r.buf.get_i16()).collect()),
        DataType::Byte => Data::I8((0..n).map(|_| r.buf.get_i8()).collect()),
        DataType::Custom => return Err(r.section.error("custom data without a codec")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    #[test]
    fn test_grid_layout() {
        let grid = GridBuilder::icosahedral(1).unwrap();
        let mut out = BytesMut::new();
        encode_grid(&grid, &mut out);
        assert_eq!(out.len(), grid_size(&grid));

        let mut buf = out.freeze();
        assert_eq!(&buf[..11], b"GEOTESSGRID");
        buf.advance(11);
        assert_eq!(buf.get_i32(), 2);
        let n = buf.get_i32() as usize;
        assert_eq!(&buf[..n], grid.software_version().as_bytes());
        buf.advance(n);
        let n = buf.get_i32() as usize;
        buf.advance(n);
        let n = buf.get_i32() as usize;
        assert_eq!(&buf[..n], grid.grid_id().as_bytes());
        buf.advance(n);
        assert_eq!(buf.get_i32(), 1);
        assert_eq!(buf.get_i32(), 1);
        assert_eq!(buf.get_i32(), 20);
        assert_eq!(buf.get_i32(), 12);
        // tessellation 0 = levels [0, 1), level 0 = triangles [0, 20)
        assert_eq!([buf.get_i32(), buf.get_i32()], [0, 1]);
        assert_eq!([buf.get_i32(), buf.get_i32()], [0, 20]);
        assert_eq!(buf.get_f64(), grid.vertex(0)[0]);
    }

    #[test]
    fn test_truncated_grid() {
        let grid = GridBuilder::icosahedral(1).unwrap();
        let mut out = BytesMut::new();
        encode_grid(&grid, &mut out);
        let truncated = out.freeze().slice(..200);
        let err = decode_grid(truncated).unwrap_err();
        assert!(err.to_string().contains("unexpected end of file"));
    }

    #[test]
    fn test_wrong_version() {
        let mut out = BytesMut::new();
        out.put_slice(b"GEOTESSGRID");
        out.put_i32(3);
        let err = decode_grid(out.freeze()).unwrap_err();
        assert!(err.to_string().contains("version 3"));
    }

    #[test]
    fn test_unknown_profile_type() {
        let mut out = BytesMut::new();
        out.put_u8(9);
        let mut r = Reader::new(out.freeze(), Section::Model);
        let err = read_profile(&mut r, &DataCodec::Numeric(DataType::Double), 1).unwrap_err();
        assert!(err.to_string().contains("unknown profile type 9"));
    }
}
