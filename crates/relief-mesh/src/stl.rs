//! STL output.
//!
//! Binary files have an 80-byte header followed by the facet count (u32) and
//! 50 bytes per facet: normal and three vertices as little-endian f32, then a
//! zero attribute byte count.

use crate::surface::facet_normal;
use crate::{MeshError, Result, SurfaceMesh};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Bytes per binary facet record.
const FACET_SIZE: usize = 50;

/// STL flavour to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StlFormat {
    /// Compact binary STL.
    #[default]
    Binary,
    /// Human-readable ASCII STL.
    Ascii,
}

/// Write `mesh` to `path`, labelled with `solid_name`.
pub fn write_stl<P: AsRef<Path>>(
    mesh: &SurfaceMesh,
    path: P,
    format: StlFormat,
    solid_name: &str,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        StlFormat::Binary => write_binary(mesh, &mut writer, solid_name)?,
        StlFormat::Ascii => write_ascii(mesh, &mut writer, solid_name)?,
    }
    writer.flush()?;

    debug!(
        path = %path.display(),
        triangles = mesh.triangle_count(),
        format = ?format,
        "Wrote STL"
    );
    Ok(())
}

fn write_binary<W: Write>(mesh: &SurfaceMesh, writer: &mut W, solid_name: &str) -> Result<()> {
    // Header must not start with "solid" or readers may take it for ASCII
    let mut header = [b' '; HEADER_SIZE];
    let text = format!("relief terrain model: {}", solid_name);
    let len = text.len().min(HEADER_SIZE);
    header[..len].copy_from_slice(&text.as_bytes()[..len]);
    writer.write_all(&header)?;

    let facet_count =
        u32::try_from(mesh.triangles.len()).map_err(|_| MeshError::TooLarge(mesh.triangles.len()))?;
    writer.write_all(&facet_count.to_le_bytes())?;

    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.map(|i| mesh.vertices[i as usize]);
        for value in facet_normal(a, b, c).into_iter().chain(a).chain(b).chain(c) {
            writer.write_all(&(value as f32).to_le_bytes())?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

fn write_ascii<W: Write>(mesh: &SurfaceMesh, writer: &mut W, solid_name: &str) -> Result<()> {
    let name: String = solid_name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    writeln!(writer, "solid {}", name)?;

    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.map(|i| mesh.vertices[i as usize]);
        let [nx, ny, nz] = facet_normal(a, b, c);
        writeln!(writer, "  facet normal {nx:.6e} {ny:.6e} {nz:.6e}")?;
        writeln!(writer, "    outer loop")?;
        for v in [a, b, c] {
            writeln!(writer, "      vertex {:.6e} {:.6e} {:.6e}", v[0], v[1], v[2])?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid {}", name)?;
    Ok(())
}

/// Read a binary STL back as an unindexed mesh (three vertices per facet).
pub fn read_binary_stl<P: AsRef<Path>>(path: P) -> Result<SurfaceMesh> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    if bytes.len() < HEADER_SIZE + 4 {
        return Err(MeshError::InvalidStl(format!(
            "{} bytes is shorter than the header",
            bytes.len()
        )));
    }
    let count_bytes = [
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ];
    let facet_count = u32::from_le_bytes(count_bytes) as usize;
    let expected = HEADER_SIZE + 4 + facet_count * FACET_SIZE;
    if bytes.len() != expected {
        return Err(MeshError::InvalidStl(format!(
            "{} facets need {} bytes, file has {}",
            facet_count,
            expected,
            bytes.len()
        )));
    }

    let mut mesh = SurfaceMesh {
        vertices: Vec::with_capacity(facet_count * 3),
        triangles: Vec::with_capacity(facet_count),
    };
    for facet in bytes[HEADER_SIZE + 4..].chunks_exact(FACET_SIZE) {
        let base = mesh.vertices.len() as u32;
        // Skip the stored normal (12 bytes)
        for vertex in facet[12..48].chunks_exact(12) {
            let coord = |k: usize| {
                f32::from_le_bytes([vertex[k], vertex[k + 1], vertex[k + 2], vertex[k + 3]]) as f64
            };
            mesh.vertices.push([coord(0), coord(4), coord(8)]);
        }
        mesh.triangles.push([base, base + 1, base + 2]);
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn triangle() -> SurfaceMesh {
        SurfaceMesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.5]],
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_binary_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tri.stl");
        write_stl(&triangle(), &path, StlFormat::Binary, "Praha 1").unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + FACET_SIZE);
        assert!(!bytes.starts_with(b"solid"));
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &1u32.to_le_bytes());
        // Second vertex x
        let at = HEADER_SIZE + 4 + 24;
        assert_eq!(&bytes[at..at + 4], &1.0f32.to_le_bytes());
        // Attribute byte count
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
    }

    #[test]
    fn test_binary_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tri.stl");
        let mesh = triangle();
        write_stl(&mesh, &path, StlFormat::Binary, "t").unwrap();

        let loaded = read_binary_stl(&path).unwrap();
        assert_eq!(loaded.triangles, vec![[0, 1, 2]]);
        assert_eq!(loaded.vertices, mesh.vertices);
    }

    #[test]
    fn test_ascii_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tri.stl");
        write_stl(&triangle(), &path, StlFormat::Ascii, "Praha 1").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("solid Praha_1\n"));
        assert!(text.trim_end().ends_with("endsolid Praha_1"));
        assert_eq!(text.matches("facet normal").count(), 1);
        assert_eq!(text.matches("vertex").count(), 3);
        assert!(matches!(read_binary_stl(&path), Err(MeshError::InvalidStl(_))));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.stl");
        fs::write(&path, [0u8; 40]).unwrap();
        assert!(matches!(read_binary_stl(&path), Err(MeshError::InvalidStl(_))));
    }
}
