//! Point cloud with index-paired unit normals, plus ASCII PLY exchange.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// An unordered set of 3D positions paired one-to-one with unit-length
/// normal vectors. Positions and normals share cardinality and index
/// correspondence.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointCloud {
    pub points: Vec<[f64; 3]>,
    pub normals: Vec<[f64; 3]>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
            normals: Vec::with_capacity(n),
        }
    }

    /// Build from separate position and normal sets; mismatched cardinality
    /// is malformed detector output.
    pub fn from_parts(points: Vec<[f64; 3]>, normals: Vec<[f64; 3]>) -> Result<Self> {
        if points.len() != normals.len() {
            return Err(Error::Detection(format!(
                "point/normal cardinality mismatch: {} points, {} normals",
                points.len(),
                normals.len()
            )));
        }
        Ok(Self { points, normals })
    }

    pub fn push(&mut self, point: [f64; 3], normal: [f64; 3]) {
        self.points.push(point);
        self.normals.push(normal);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Write as ASCII PLY with `x y z nx ny nz` vertex properties.
    pub fn write_ply(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "ply")?;
        writeln!(out, "format ascii 1.0")?;
        writeln!(out, "element vertex {}", self.len())?;
        for prop in ["x", "y", "z", "nx", "ny", "nz"] {
            writeln!(out, "property double {prop}")?;
        }
        writeln!(out, "end_header")?;
        for (p, n) in self.points.iter().zip(&self.normals) {
            writeln!(out, "{} {} {} {} {} {}", p[0], p[1], p[2], n[0], n[1], n[2])?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read an ASCII PLY containing at least `x y z nx ny nz` vertex
    /// properties; extra properties are ignored.
    pub fn read_ply(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let header = PlyHeader::read(&mut reader, path)?;

        let wanted = ["x", "y", "z", "nx", "ny", "nz"];
        let mut columns = [0usize; 6];
        for (slot, name) in columns.iter_mut().zip(wanted) {
            *slot = header
                .properties
                .iter()
                .position(|p| p == name)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "{}: missing vertex property '{name}'",
                        path.display()
                    ))
                })?;
        }

        let mut cloud = Self::with_capacity(header.vertex_count);
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if cloud.len() >= header.vertex_count {
                break;
            }
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.len() < header.properties.len() {
                return Err(Error::Configuration(format!(
                    "{}: expected {} scalars per vertex, found {}",
                    path.display(),
                    header.properties.len(),
                    tokens.len()
                )));
            }
            let mut row = [0.0f64; 6];
            for (value, &col) in row.iter_mut().zip(&columns) {
                *value = tokens[col].parse().map_err(|_| {
                    Error::Configuration(format!(
                        "{}: invalid scalar '{}'",
                        path.display(),
                        tokens[col]
                    ))
                })?;
            }
            cloud.push([row[0], row[1], row[2]], [row[3], row[4], row[5]]);
        }
        if cloud.len() != header.vertex_count {
            return Err(Error::Configuration(format!(
                "{}: header declares {} vertices, found {}",
                path.display(),
                header.vertex_count,
                cloud.len()
            )));
        }
        Ok(cloud)
    }
}

struct PlyHeader {
    vertex_count: usize,
    properties: Vec<String>,
}

impl PlyHeader {
    fn read(reader: &mut impl BufRead, path: &Path) -> Result<Self> {
        let bad = |msg: String| Error::Configuration(format!("{}: {msg}", path.display()));

        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.trim() != "ply" {
            return Err(bad("not a PLY file".into()));
        }

        let mut vertex_count = None;
        let mut properties = Vec::new();
        let mut in_vertex_element = false;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(bad("unterminated header".into()));
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["end_header"] => break,
                ["comment", ..] => {}
                ["format", kind, _version] => {
                    if *kind != "ascii" {
                        return Err(bad(format!("unsupported PLY format '{kind}'")));
                    }
                }
                ["element", "vertex", count] => {
                    vertex_count = Some(
                        count
                            .parse()
                            .map_err(|_| bad(format!("invalid vertex count '{count}'")))?,
                    );
                    in_vertex_element = true;
                }
                ["element", ..] => in_vertex_element = false,
                ["property", _ty, name] if in_vertex_element => {
                    properties.push((*name).to_string());
                }
                ["property", ..] => {}
                _ => return Err(bad(format!("unrecognized header line '{}'", line.trim()))),
            }
        }
        let vertex_count = vertex_count.ok_or_else(|| bad("missing vertex element".into()))?;
        Ok(Self {
            vertex_count,
            properties,
        })
    }
}
