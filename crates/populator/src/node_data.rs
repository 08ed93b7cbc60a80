//! `GridNode` values stored as custom model data.

use crate::node::{GridNode, NodeStation, PhaseInfo};
use crate::station::PhaseType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use geotess::{CodecRegistry, CustomData, CustomDataCodec, GeoTessError, Result, TextReader};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::Hasher;
use std::sync::Arc;
use uuid::Uuid;

/// Data type name recorded in model files.
pub const TYPE_NAME: &str = "GridNodeData";

/// Custom node value wrapping a [`GridNode`]. `None` marks a vertex for which
/// no station produced a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct GridNodeData(Option<GridNode>);

impl GridNodeData {
    pub fn new(node: GridNode) -> Self {
        Self(Some(node))
    }

    /// The "could not compute" sentinel.
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn grid_node(&self) -> Option<&GridNode> {
        self.0.as_ref()
    }

    fn encode(&self, out: &mut BytesMut) {
        match &self.0 {
            None => {
                put_uuid(out, &Uuid::nil());
                for _ in 0..4 {
                    out.put_f64(f64::NAN);
                }
                out.put_i32(0);
            }
            Some(node) => {
                put_uuid(out, &node.id);
                out.put_f64(node.center_latitude_degrees);
                out.put_f64(node.center_longitude_degrees);
                out.put_f64(node.center_depth_km);
                out.put_f64(node.grid_cell_height_km);
                out.put_i32(node.node_stations.len() as i32);
                for ns in &node.node_stations {
                    put_uuid(out, &ns.id);
                    put_uuid(out, &ns.station_id);
                    out.put_f64(ns.distance_degrees);
                    out.put_i32(ns.phase_infos.len() as i32);
                    for info in &ns.phase_infos {
                        put_string(out, info.phase.as_str());
                        out.put_u8(info.primary as u8);
                        for v in info.numbers() {
                            out.put_f64(v);
                        }
                    }
                }
            }
        }
    }

    fn encoded_size(&self) -> usize {
        const UUID_LEN: usize = 4 + 36;
        let stations = self.0.as_ref().map_or(0, |node| {
            node.node_stations
                .iter()
                .map(|ns| {
                    2 * UUID_LEN
                        + 8
                        + 4
                        + ns.phase_infos
                            .iter()
                            .map(|p| 4 + p.phase.as_str().len() + 1 + 13 * 8)
                            .sum::<usize>()
                })
                .sum()
        });
        UUID_LEN + 4 * 8 + 4 + stations
    }
}

impl CustomData for GridNodeData {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn eq_data(&self, other: &dyn CustomData) -> bool {
        other.as_any().downcast_ref::<GridNodeData>() == Some(self)
    }

    fn content_hash(&self) -> u64 {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode(&mut buf);
        let mut hasher = DefaultHasher::new();
        hasher.write(&buf);
        hasher.finish()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Binary and ASCII codec for [`GridNodeData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GridNodeDataCodec;

/// A registry holding the [`GridNodeDataCodec`].
pub fn codec_registry() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    registry.register(Arc::new(GridNodeDataCodec));
    registry
}

fn downcast(data: &dyn CustomData) -> Result<&GridNodeData> {
    data.as_any()
        .downcast_ref::<GridNodeData>()
        .ok_or_else(|| GeoTessError::unknown_data_type(data.type_name()))
}

fn put_string(out: &mut BytesMut, s: &str) {
    out.put_i32(s.len() as i32);
    out.put_slice(s.as_bytes());
}

fn put_uuid(out: &mut BytesMut, id: &Uuid) {
    put_string(out, &id.to_string());
}

fn need(buf: &Bytes, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(GeoTessError::malformed_model(format!(
            "grid node data truncated reading {}",
            what
        )));
    }
    Ok(())
}

fn get_count(buf: &mut Bytes, what: &str) -> Result<usize> {
    need(buf, 4, what)?;
    let n = buf.get_i32();
    usize::try_from(n)
        .map_err(|_| GeoTessError::malformed_model(format!("negative {} count {}", what, n)))
}

fn get_f64(buf: &mut Bytes, what: &str) -> Result<f64> {
    need(buf, 8, what)?;
    Ok(buf.get_f64())
}

fn get_string(buf: &mut Bytes, what: &str) -> Result<String> {
    let n = get_count(buf, what)?;
    need(buf, n, what)?;
    String::from_utf8(buf.split_to(n).to_vec())
        .map_err(|_| GeoTessError::malformed_model(format!("{} is not UTF-8", what)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| GeoTessError::malformed_model(format!("bad id {}: {}", s, e)))
}

fn parse_phase(s: &str) -> Result<PhaseType> {
    s.parse().map_err(GeoTessError::malformed_model)
}

fn finish(id: Uuid, node: impl FnOnce() -> GridNode) -> Arc<dyn CustomData> {
    if id.is_nil() {
        Arc::new(GridNodeData::empty())
    } else {
        Arc::new(GridNodeData::new(node()))
    }
}

impl CustomDataCodec for GridNodeDataCodec {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn read_binary(&self, buf: &mut Bytes, _attribute_count: usize) -> Result<Arc<dyn CustomData>> {
        let id = parse_uuid(&get_string(buf, "grid node id")?)?;
        let lat = get_f64(buf, "center latitude")?;
        let lon = get_f64(buf, "center longitude")?;
        let depth = get_f64(buf, "center depth")?;
        let height = get_f64(buf, "cell height")?;
        let n = get_count(buf, "node station")?;
        let mut node_stations = Vec::with_capacity(n);
        for _ in 0..n {
            let ns_id = parse_uuid(&get_string(buf, "node station id")?)?;
            let station_id = parse_uuid(&get_string(buf, "station id")?)?;
            let distance = get_f64(buf, "station distance")?;
            let m = get_count(buf, "phase info")?;
            let mut phase_infos = Vec::with_capacity(m);
            for _ in 0..m {
                let phase = parse_phase(&get_string(buf, "phase")?)?;
                need(buf, 1, "primary flag")?;
                let primary = buf.get_u8() != 0;
                let mut numbers = [0.0; 13];
                for v in numbers.iter_mut() {
                    *v = get_f64(buf, "phase info")?;
                }
                phase_infos.push(PhaseInfo::from_numbers(phase, primary, numbers));
            }
            node_stations.push(NodeStation {
                id: ns_id,
                station_id,
                distance_degrees: distance,
                phase_infos,
            });
        }
        Ok(finish(id, || GridNode {
            id,
            center_latitude_degrees: lat,
            center_longitude_degrees: lon,
            center_depth_km: depth,
            grid_cell_height_km: height,
            node_stations,
        }))
    }

    fn write_binary(&self, data: &dyn CustomData, out: &mut BytesMut) -> Result<()> {
        downcast(data)?.encode(out);
        Ok(())
    }

    fn read_ascii(
        &self,
        reader: &mut TextReader<'_>,
        _attribute_count: usize,
    ) -> Result<Arc<dyn CustomData>> {
        let id = parse_uuid(reader.token("grid node id")?)?;
        let lat = reader.parse("center latitude")?;
        let lon = reader.parse("center longitude")?;
        let depth = reader.parse("center depth")?;
        let height = reader.parse("cell height")?;
        let n: usize = reader.parse("node station count")?;
        let mut node_stations = Vec::with_capacity(n);
        for _ in 0..n {
            let ns_id = parse_uuid(reader.token("node station id")?)?;
            let station_id = parse_uuid(reader.token("station id")?)?;
            let distance = reader.parse("station distance")?;
            let m: usize = reader.parse("phase info count")?;
            let mut phase_infos = Vec::with_capacity(m);
            for _ in 0..m {
                let phase = parse_phase(reader.token("phase")?)?;
                let primary = reader.parse("primary flag")?;
                let mut numbers = [0.0; 13];
                for v in numbers.iter_mut() {
                    *v = reader.parse("phase info")?;
                }
                phase_infos.push(PhaseInfo::from_numbers(phase, primary, numbers));
            }
            node_stations.push(NodeStation {
                id: ns_id,
                station_id,
                distance_degrees: distance,
                phase_infos,
            });
        }
        Ok(finish(id, || GridNode {
            id,
            center_latitude_degrees: lat,
            center_longitude_degrees: lon,
            center_depth_km: depth,
            grid_cell_height_km: height,
            node_stations,
        }))
    }

    fn write_ascii(&self, data: &dyn CustomData, out: &mut String) -> Result<()> {
        match &downcast(data)?.0 {
            None => write!(out, "{} NaN NaN NaN NaN 0", Uuid::nil())?,
            Some(node) => {
                write!(
                    out,
                    "{} {} {} {} {} {}",
                    node.id,
                    node.center_latitude_degrees,
                    node.center_longitude_degrees,
                    node.center_depth_km,
                    node.grid_cell_height_km,
                    node.node_stations.len()
                )?;
                for ns in &node.node_stations {
                    write!(
                        out,
                        " {} {} {} {}",
                        ns.id,
                        ns.station_id,
                        ns.distance_degrees,
                        ns.phase_infos.len()
                    )?;
                    for info in &ns.phase_infos {
                        write!(out, " {} {}", info.phase, info.primary)?;
                        for v in info.numbers() {
                            write!(out, " {}", v)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn size(&self, data: &dyn CustomData) -> usize {
        downcast(data).map_or(0, GridNodeData::encoded_size)
    }
}
