//! Line-oriented text encoding.
//!
//! Grid files carry `#` comment lines ahead of each table; readers skip
//! them. Floating values are written in their shortest exact decimal form so
//! that a text round trip reproduces every bit.

use super::{
    CodecRegistry, DataCodec, Header, ModelParts, Section, FORMAT_VERSION, GRID_MAGIC, MODEL_MAGIC,
};
use crate::config::GeoTessConfig;
use crate::data::{Data, DataType};
use crate::error::{GeoTessError, Result};
use crate::grid::Grid;
use crate::model::Model;
use crate::profile::{Profile, ProfileType};
use std::fmt::Write;
use std::str::FromStr;

const DESCRIPTION_OPEN: &str = "<model_description>";
const DESCRIPTION_CLOSE: &str = "</model_description>";

/// Cursor over ASCII model and grid text.
///
/// Custom data codecs read their tokens through [`TextReader::token`] and
/// [`TextReader::parse`].
pub struct TextReader<'a> {
    text: &'a str,
    pos: usize,
    section: Section,
}

impl<'a> TextReader<'a> {
    pub(crate) fn new(text: &'a str, section: Section) -> Self {
        Self {
            text,
            pos: 0,
            section,
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Current line number, for error messages.
    fn line_number(&self) -> usize {
        self.text[..self.pos].matches('\n').count() + 1
    }

    /// Error of the kind matching the file being read, tagged with the line.
    pub fn error(&self, msg: impl Into<String>) -> GeoTessError {
        self.section
            .error(format!("line {}: {}", self.line_number(), msg.into()))
    }

    /// Rest of the current line, consuming the newline.
    pub(crate) fn line(&mut self, what: &str) -> Result<&'a str> {
        let rest = self.rest();
        if rest.is_empty() {
            return Err(self.error(format!("unexpected end of file reading {}", what)));
        }
        let (line, advance) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        Ok(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Next line that is not a `#` comment.
    pub(crate) fn data_line(&mut self, what: &str) -> Result<&'a str> {
        loop {
            let line = self.line(what)?;
            if !line.starts_with('#') {
                return Ok(line);
            }
        }
    }

    /// Consume the remainder of the current line, which must be blank.
    pub(crate) fn end_line(&mut self) -> Result<()> {
        let line = self.line("end of line").unwrap_or("");
        if !line.trim().is_empty() {
            return Err(self.error(format!("unexpected trailing text {:?}", line.trim())));
        }
        Ok(())
    }

    /// Next whitespace-separated token, skipping comment lines.
    pub fn token(&mut self, what: &str) -> Result<&'a str> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.is_empty() {
                return Err(self.error(format!("unexpected end of file reading {}", what)));
            }
            if trimmed.starts_with('#') {
                self.line(what)?;
                continue;
            }
            let end = trimmed
                .find(char::is_whitespace)
                .unwrap_or(trimmed.len());
            self.pos += end;
            return Ok(&trimmed[..end]);
        }
    }

    /// Next token parsed as `T`.
    pub fn parse<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.token(what)?;
        token
            .parse()
            .map_err(|_| self.error(format!("cannot parse {} from {:?}", what, token)))
    }

    fn index(&mut self, what: &str) -> Result<usize> {
        self.parse(what)
    }

    /// A header line that must equal `expected`.
    fn expect_line(&mut self, expected: &str) -> Result<()> {
        let line = self.line(expected)?;
        if line.trim() != expected {
            return Err(self.error(format!("expected {:?}, found {:?}", expected, line)));
        }
        Ok(())
    }

    fn magic(&mut self, magic: &str) -> Result<()> {
        self.expect_line(magic)?;
        let version: i32 = self
            .line("format version")?
            .trim()
            .parse()
            .map_err(|_| self.error("format version is not an integer"))?;
        if version != FORMAT_VERSION {
            return Err(self.error(format!("unsupported {} format version {}", magic, version)));
        }
        Ok(())
    }

    /// `prefix: value` line.
    fn labeled(&mut self, prefix: &str) -> Result<String> {
        let line = self.line(prefix)?;
        line.trim_start()
            .strip_prefix(prefix)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| self.error(format!("expected {:?} line, found {:?}", prefix, line)))
    }
}

// ----------------------------------------------------------------------
// Grid
// ----------------------------------------------------------------------

pub(super) fn encode_grid(grid: &Grid, out: &mut String) -> Result<()> {
    writeln!(out, "{}", GRID_MAGIC)?;
    writeln!(out, "{}", FORMAT_VERSION)?;
    writeln!(out, "{}", grid.software_version())?;
    writeln!(out, "{}", grid.generation_date())?;
    writeln!(out, "#unique Grid ID:")?;
    writeln!(out, "{}", grid.grid_id())?;
    writeln!(out, "#geotess grid: nTessellations, nLevels, nTriangles, nVertices:")?;
    writeln!(
        out,
        "{} {} {} {}",
        grid.tessellation_count(),
        grid.total_level_count(),
        grid.triangle_count(),
        grid.vertex_count()
    )?;
    writeln!(out, "#geotess grid tessellations:")?;
    for [first, last] in grid.tessellation_ranges() {
        writeln!(out, "{} {}", first, last)?;
    }
    writeln!(out, "#geotess grid levels:")?;
    for [first, last] in grid.level_ranges() {
        writeln!(out, "{} {}", first, last)?;
    }
    writeln!(out, "#geotess grid vertices(unit_vectors):")?;
    for [x, y, z] in grid.vertices() {
        writeln!(out, "{} {} {}", x, y, z)?;
    }
    writeln!(out, "#geotess grid triangles:")?;
    for [a, b, c] in grid.triangles() {
        writeln!(out, "{} {} {}", a, b, c)?;
    }
    Ok(())
}

pub(super) fn decode_grid(text: &str) -> Result<Grid> {
    let mut r = TextReader::new(text, Section::Grid);
    read_grid(&mut r)
}

fn read_grid(r: &mut TextReader<'_>) -> Result<Grid> {
    r.section = Section::Grid;
    r.magic(GRID_MAGIC)?;
    let software_version = r.line("software version")?.to_string();
    let generation_date = r.line("generation date")?.to_string();
    let grid_id = r.data_line("grid id")?.trim().to_string();

    let n_tess = r.index("tessellation count")?;
    let n_levels = r.index("level count")?;
    let n_triangles = r.index("triangle count")?;
    let n_vertices = r.index("vertex count")?;

    let mut pairs = |n: usize, what: &str| -> Result<Vec<[usize; 2]>> {
        (0..n).map(|_| Ok([r.index(what)?, r.index(what)?])).collect()
    };
    let tessellations = pairs(n_tess, "tessellation range")?;
    let levels = pairs(n_levels, "level range")?;

    let vertices = (0..n_vertices)
        .map(|_| Ok([r.parse("vertex")?, r.parse("vertex")?, r.parse("vertex")?]))
        .collect::<Result<Vec<[f64; 3]>>>()?;
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
    out: &mut String,
) -> Result<()> {
    writeln!(out, "{}", MODEL_MAGIC)?;
    writeln!(out, "{}", FORMAT_VERSION)?;
    writeln!(out, "{}", header.software_version)?;
    writeln!(out, "{}", header.generation_date)?;
    writeln!(out, "{}", header.earth_shape)?;
    writeln!(out, "{}", DESCRIPTION_OPEN)?;
    writeln!(out, "{}", header.description)?;
    writeln!(out, "{}", DESCRIPTION_CLOSE)?;
    writeln!(out, "attributes: {}", header.attribute_names)?;
    writeln!(out, "units: {}", header.attribute_units)?;
    writeln!(out, "layers: {}", header.layer_names)?;
    writeln!(out, "{}", header.data_type)?;
    writeln!(out, "{}", header.vertex_count)?;
    for tess in &header.layer_tess_ids {
        write!(out, " {}", tess)?;
    }
    writeln!(out)?;

    for profiles in model.all_profiles() {
        for profile in profiles {
            write_profile(profile, registry, out)?;
        }
    }

    writeln!(out, "{}", grid_file)?;
    writeln!(out, "{}", model.grid().grid_id())?;
    if grid_file == super::EMBEDDED_GRID {
        encode_grid(model.grid(), out)?;
    }
    Ok(())
}

fn write_profile(profile: &Profile, registry: &CodecRegistry, out: &mut String) -> Result<()> {
    write!(out, "{}", profile.profile_type().ordinal())?;
    match profile {
        Profile::Empty {
            radius_bottom,
            radius_top,
        } => write!(out, " {} {}", radius_bottom, radius_top)?,
        Profile::Thin { radius, data } => {
            write!(out, " {}", radius)?;
            write_data(data, registry, out)?;
        }
        Profile::Constant {
            radius_bottom,
            radius_top,
            data,
        } => {
            write!(out, " {} {}", radius_bottom, radius_top)?;
            write_data(data, registry, out)?;
        }
        Profile::NPoint { radii, data, .. } => {
            write!(out, " {}", radii.len())?;
            for (r, d) in radii.iter().zip(data) {
                write!(out, "\n{}", r)?;
                write_data(d, registry, out)?;
            }
        }
        Profile::Surface { data } => write_data(data, registry, out)?,
        Profile::SurfaceEmpty => {}
    }
    writeln!(out)?;
    Ok(())
}

/// Append ` v0 v1 ...` for every attribute value.
fn write_data(data: &Data, registry: &CodecRegistry, out: &mut String) -> Result<()> {
    fn each<T: std::fmt::Display>(values: &[T], out: &mut String) -> Result<()> {
        for v in values {
            write!(out, " {}", v)?;
        }
        Ok(())
    }
    match data {
        Data::F64(v) => each(v, out),
        Data::F32(v) => each(v, out),
        Data::I64(v) => each(v, out),
        Data::I32(v) => each(v, out),
        Data::I16(v) => each(v, out),
        Data::I8(v) => each(v, out),
        Data::Custom(c) => {
            out.push(' ');
            registry.codec_for(c.as_ref())?.write_ascii(c.as_ref(), out)
        }
    }
}

pub(super) fn decode_model(
    text: &str,
    registry: &CodecRegistry,
    config: &GeoTessConfig,
) -> Result<ModelParts> {
    let mut r = TextReader::new(text, Section::Model);
    r.magic(MODEL_MAGIC)?;

    let software_version = r.line("software version")?.to_string();
    let generation_date = r.line("generation date")?.to_string();
    let earth_shape = r.line("earth shape")?.trim().to_string();

    r.expect_line(DESCRIPTION_OPEN)?;
    let mut description = Vec::new();
    loop {
        let line = r.line("model description")?;
        if line.trim() == DESCRIPTION_CLOSE {
            break;
        }
        description.push(line);
    }

    let attribute_names = r.labeled("attributes:")?;
    let attribute_units = r.labeled("units:")?;
    let layer_names = r.labeled("layers:")?;
    let data_type = r.line("data type")?.trim().to_string();
    let vertex_count = r.index("vertex count")?;
    let layer_count = layer_names.split(';').count();
    let layer_tess_ids = (0..layer_count)
        .map(|_| r.index("layer tessellation"))
        .collect::<Result<Vec<_>>>()?;

    let header = Header {
        software_version,
        generation_date,
        earth_shape,
        description: description.join("\n"),
        attribute_names,
        attribute_units,
        layer_names,
        data_type,
        vertex_count,
        layer_tess_ids,
    };
    let (metadata, codec) = header.prepare(registry, config)?;
    let attribute_count = metadata.attribute_count();

    let mut profiles = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let layers = (0..layer_count)
            .map(|_| read_profile(&mut r, &codec, attribute_count))
            .collect::<Result<Vec<_>>>()?;
        profiles.push(layers);
    }
    r.end_line()?;

    let grid_file = r.line("grid file name")?.trim().to_string();
    let grid_id = r.line("grid id")?.trim().to_string();
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

fn read_profile(
    r: &mut TextReader<'_>,
    codec: &DataCodec,
    attribute_count: usize,
) -> Result<Profile> {
    let ordinal: u8 = r.parse("profile type")?;
    let kind = ProfileType::from_ordinal(ordinal)
        .ok_or_else(|| r.error(format!("unknown profile type {}", ordinal)))?;
    match kind {
        ProfileType::Empty => {
            let bottom = r.parse("radius")?;
            let top = r.parse("radius")?;
            Profile::empty(bottom, top)
        }
        ProfileType::Thin => {
            let radius = r.parse("radius")?;
            Ok(Profile::thin(radius, read_data(r, codec, attribute_count)?))
        }
        ProfileType::Constant => {
            let bottom = r.parse("radius")?;
            let top = r.parse("radius")?;
            Profile::constant(bottom, top, read_data(r, codec, attribute_count)?)
        }
        ProfileType::NPoint => {
            let n = r.index("node count")?;
            let mut radii = Vec::with_capacity(n.min(r.rest().len()));
            let mut data = Vec::with_capacity(n.min(r.rest().len()));
            for _ in 0..n {
                radii.push(r.parse("radius")?);
                data.push(read_data(r, codec, attribute_count)?);
            }
            Profile::npoint(radii, data)
        }
        ProfileType::Surface => Ok(Profile::surface(read_data(r, codec, attribute_count)?)),
        ProfileType::SurfaceEmpty => Ok(Profile::SurfaceEmpty),
    }
}

fn read_data(r: &mut TextReader<'_>, codec: &DataCodec, n: usize) -> Result<Data> {
    fn values<T: FromStr>(r: &mut TextReader<'_>, n: usize) -> Result<Vec<T>> {
        (0..n).map(|_| r.parse("attribute value")).collect()
    }
    let dt = match codec {
        DataCodec::Custom(custom) => return Ok(Data::Custom(custom.read_ascii(r, n)?)),
        DataCodec::Numeric(dt) => *dt,
    };
    Ok(match dt {
        DataType::Double => Data::F64(values(r, n)?),
        DataType::Float => Data::F32(values(r, n)?),
        DataType::Long => Data::I64(values(r, n)?),
        DataType::Int => Data::I32(values(r, n)?),
        DataType::Short => Data::I16(values(r, n)?),
        DataType::Byte => Data::I8(values(r, n)?),
        DataType::Custom => return Err(r.error("custom data without a codec")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    #[test]
    fn test_tokens_skip_comments() {
        let mut r = TextReader::new("  12 #x\n# comment\n\t-3.5\n", Section::Model);
        assert_eq!(r.parse::<i32>("a").unwrap(), 12);
        assert_eq!(r.parse::<f64>("b").unwrap(), -3.5);
        assert!(r.token("c").is_err());
    }

    #[test]
    fn test_error_has_line_number() {
        let mut r = TextReader::new("1\n2\nabc\n", Section::Grid);
        r.parse::<i32>("a").unwrap();
        r.parse::<i32>("b").unwrap();
        let err = r.parse::<i32>("c").unwrap_err();
        assert!(matches!(err, GeoTessError::MalformedGrid(_)));
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn test_grid_layout() {
        let grid = GridBuilder::icosahedral(1).unwrap();
        let mut out = String::new();
        encode_grid(&grid, &mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "GEOTESSGRID");
        assert_eq!(lines[1], "2");
        assert_eq!(lines[4], "#unique Grid ID:");
        assert_eq!(lines[5], grid.grid_id());
        assert_eq!(lines[7], "1 1 20 12");
        assert_eq!(lines[9], "0 1");
        assert_eq!(lines[11], "0 20");
        assert_eq!(lines.len(), 13 + 12 + 1 + 20);
    }

    #[test]
    fn test_float_text_is_exact() {
        let grid = GridBuilder::icosahedral(3).unwrap();
        let mut out = String::new();
        encode_grid(&grid, &mut out).unwrap();
        let back = decode_grid(&out).unwrap();
        assert_eq!(back.vertices(), grid.vertices());
    }

    #[test]
    fn test_npoint_profile_text() {
        let profile = Profile::npoint(
            vec![10.0, 20.5],
            vec![Data::I16(vec![1, -2]), Data::I16(vec![3, 4])],
        )
        .unwrap();
        let mut out = String::new();
        write_profile(&profile, &CodecRegistry::new(), &mut out).unwrap();
        assert_eq!(out, "3 2\n10 1 -2\n20.5 3 4\n");

        let mut r = TextReader::new(&out, Section::Model);
        let back = read_profile(&mut r, &DataCodec::Numeric(DataType::Short), 2).unwrap();
        assert_eq!(back, profile);
    }
}
