//! GDS-II binary stream reader and writer.
//!
//! GDS-II (Graphic Data System II) is the industry-standard binary format
//! for mask layout. The reader streams records into a [`Library`] of cells,
//! materialising only the shapes accepted by its [`LayerFilter`]; cell
//! references are always kept so the hierarchy can be flattened later.
//!
//! ## GDS-II Record Structure
//! Each record: [2-byte length][2-byte record type][payload]
//! Record types define the hierarchy: BGNLIB → BGNSTR → BOUNDARY/PATH/SREF → ENDSTR → ENDLIB

use std::collections::BTreeSet;
use std::io::{self, Read};
use std::path::PathBuf;

use thiserror::Error;

use chipstack_core::cell::{ArrayGrid, Cell, CellInstance, Shape, ShapeGeometry, Transform};
use chipstack_core::geometry::{Point, Polygon};
use chipstack_core::layer::LayerKey;
use chipstack_core::library::{Library, LibraryError};
use chipstack_core::path::{LayoutPath, PathEnd};

// ── GDS-II Record Types ──────────────────────────────────────────────

#[allow(dead_code)]
mod record_type {
    pub const HEADER: u16     = 0x0002;
    pub const BGNLIB: u16     = 0x0102;
    pub const LIBNAME: u16    = 0x0206;
    pub const UNITS: u16      = 0x0305;
    pub const ENDLIB: u16     = 0x0400;
    pub const BGNSTR: u16     = 0x0502;
    pub const STRNAME: u16    = 0x0606;
    pub const ENDSTR: u16     = 0x0700;
    pub const BOUNDARY: u16   = 0x0800;
    pub const PATH: u16       = 0x0900;
    pub const SREF: u16       = 0x0A00;
    pub const AREF: u16       = 0x0B00;
    pub const TEXT: u16       = 0x0C00;
    pub const LAYER: u16      = 0x0D02;
    pub const DATATYPE: u16   = 0x0E02;
    pub const WIDTH: u16      = 0x0F03;
    pub const XY: u16         = 0x1003;
    pub const ENDEL: u16      = 0x1100;
    pub const SNAME: u16      = 0x1206;
    pub const COLROW: u16     = 0x1302;
    pub const NODE: u16       = 0x1500;
    pub const TEXTTYPE: u16   = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16     = 0x1906;
    pub const STRANS: u16     = 0x1A01;
    pub const MAG: u16        = 0x1B05;
    pub const ANGLE: u16      = 0x1C05;
    pub const PATHTYPE: u16   = 0x2102;
    pub const PROPATTR: u16   = 0x2B02;
    pub const PROPVALUE: u16  = 0x2C06;
    pub const BOX: u16        = 0x2D00;
    pub const BOXTYPE: u16    = 0x2E02;
    pub const BGNEXTN: u16    = 0x3003;
    pub const ENDEXTN: u16    = 0x3103;
}

/// STRANS bit for reflection about the X axis.
const STRANS_REFLECT: u16 = 0x8000;

/// Fixed modification/access stamp written into BGNLIB/BGNSTR.
const TIMESTAMP: [i16; 12] = [2025, 1, 1, 0, 0, 0, 2025, 1, 1, 0, 0, 0];

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("GDS-II file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },

    #[error("GDS-II stream ends at offset {offset} before ENDLIB")]
    UnexpectedEof { offset: u64 },

    #[error("Invalid cell hierarchy: {0}")]
    Hierarchy(#[from] LibraryError),
}

impl GdsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GdsError::NotFound(_))
    }

    /// True when the bytes were readable but are not a valid GDS-II library.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, GdsError::NotFound(_) | GdsError::Io(_))
    }
}

// ── Layer filter ──────────────────────────────────────────────────────

/// Which shapes the reader materialises. References are always kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LayerFilter {
    #[default]
    All,
    Only(BTreeSet<LayerKey>),
}

impl LayerFilter {
    pub fn single(key: LayerKey) -> Self {
        LayerFilter::Only(BTreeSet::from([key]))
    }

    /// Parse the hierarchy only, keep no shapes.
    pub fn none() -> Self {
        LayerFilter::Only(BTreeSet::new())
    }

    pub fn accepts(&self, key: LayerKey) -> bool {
        match self {
            LayerFilter::All => true,
            LayerFilter::Only(keys) => keys.contains(&key),
        }
    }
}

// ── GDS-II Record ─────────────────────────────────────────────────────

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    data: Vec<u8>,
}

impl GdsRecord {
    /// Parse payload as 16-bit integers.
    fn as_i16_vec(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    fn first_i16(&self) -> Option<i16> {
        self.as_i16_vec().first().copied()
    }

    /// Parse payload as 32-bit integers.
    fn as_i32_vec(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Parse payload as ASCII string.
    fn as_string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    /// Parse payload as GDS-II 8-byte reals (excess-64 floating point).
    fn as_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(c);
                gds_real8_to_f64(&bytes)
            })
            .collect()
    }
}

/// Convert GDS-II excess-64 real format to IEEE 754 f64.
fn gds_real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut mantissa: u64 = 0;
    for &b in &bytes[1..] {
        mantissa = (mantissa << 8) | (b as u64);
    }

    let mantissa_f = mantissa as f64 / (1u64 << 56) as f64;
    sign * mantissa_f * 16.0_f64.powi(exponent)
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Find exponent such that 1/16 <= mantissa < 1
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mut mantissa = (val * (1u64 << 56) as f64).round() as u64;
    if mantissa >= 1u64 << 56 {
        // Rounded up to 1.0; renormalise.
        mantissa >>= 4;
        exponent += 1;
    }
    let mut result = [0u8; 8];
    result[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    result[1..].copy_from_slice(&mantissa.to_be_bytes()[1..]);
    result
}

// ── GDS-II Reader ─────────────────────────────────────────────────────

pub struct GdsReader<R: Read> {
    reader: R,
    filter: LayerFilter,
    /// Target unit in metres; non-positive keeps the library's user unit.
    unit_scale: f64,
    /// Database units → output units, fixed by the UNITS record.
    coord_scale: f64,
    offset: u64,
}

impl<R: Read> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            filter: LayerFilter::All,
            unit_scale: 1e-6,
            coord_scale: 1e-3, // Until UNITS: 1nm database unit in micrometres
            offset: 0,
        }
    }

    pub fn with_filter(mut self, filter: LayerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the output unit in metres (1e-6 reads coordinates in micrometres).
    pub fn with_unit_scale(mut self, unit_scale: f64) -> Self {
        self.unit_scale = unit_scale;
        if unit_scale > 0.0 {
            self.coord_scale = 1e-9 / unit_scale;
        }
        self
    }

    /// Read the entire GDS-II stream into a Library.
    pub fn read(&mut self) -> Result<Library, GdsError> {
        let mut lib = Library::new("imported");

        self.read_header()?;
        self.read_lib(&mut lib)?;

        Ok(lib)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let start = self.offset;
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }

        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(GdsError::InvalidRecord {
                offset: start,
                message: format!("Record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.read_payload(&mut type_buf, start)?;
        let record_type = u16::from_be_bytes(type_buf);

        let mut data = vec![0u8; total_len - 4];
        if !data.is_empty() {
            self.read_payload(&mut data, start)?;
        }

        self.offset += total_len as u64;
        Ok(Some(GdsRecord { record_type, data }))
    }

    fn read_payload(&mut self, buf: &mut [u8], start: u64) -> Result<(), GdsError> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                GdsError::InvalidRecord {
                    offset: start,
                    message: "Record truncated".into(),
                }
            } else {
                GdsError::Io(e)
            }
        })
    }

    /// Next record; running out of input here means the stream is truncated.
    fn expect_record(&mut self) -> Result<GdsRecord, GdsError> {
        self.read_record()?
            .ok_or(GdsError::UnexpectedEof { offset: self.offset })
    }

    fn read_header(&mut self) -> Result<(), GdsError> {
        let rec = self.read_record()?.ok_or(GdsError::InvalidRecord {
            offset: 0,
            message: "Empty file".into(),
        })?;

        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }

        if let Some(version) = rec.first_i16() {
            log::debug!("GDS-II version: {}", version);
        }

        Ok(())
    }

    fn read_lib(&mut self, lib: &mut Library) -> Result<(), GdsError> {
        loop {
            let rec = self.expect_record()?;

            match rec.record_type {
                record_type::BGNLIB => {
                    // Timestamps only
                }
                record_type::LIBNAME => {
                    lib.name = rec.as_string();
                    log::debug!("Library name: {}", lib.name);
                }
                record_type::UNITS => {
                    let units = rec.as_f64_vec();
                    if units.len() < 2 || units[1] <= 0.0 {
                        return Err(GdsError::InvalidRecord {
                            offset: self.offset,
                            message: "UNITS record must hold two positive reals".into(),
                        });
                    }
                    lib.user_units_per_dbu = units[0];
                    lib.meters_per_dbu = units[1];
                    self.coord_scale = if self.unit_scale > 0.0 {
                        units[1] / self.unit_scale
                    } else {
                        units[0]
                    };
                    log::debug!(
                        "Database unit: {} m, user unit scale {}, coordinate scale {}",
                        units[1],
                        units[0],
                        self.coord_scale
                    );
                }
                record_type::BGNSTR => {
                    let cell = self.read_structure()?;
                    lib.add_cell(cell);
                }
                record_type::ENDLIB => {
                    log::info!("Read library '{}': {} cells", lib.name, lib.cell_count());
                    break;
                }
                _ => {
                    // Skip unknown records
                }
            }
        }

        Ok(())
    }

    fn read_structure(&mut self) -> Result<Cell, GdsError> {
        let mut cell = Cell::new("unnamed");

        loop {
            let rec = self.expect_record()?;

            match rec.record_type {
                record_type::STRNAME => {
                    cell.name = rec.as_string();
                }
                record_type::BOUNDARY => {
                    if let Some(shape) = self.read_boundary(record_type::DATATYPE)? {
                        cell.add_shape(shape);
                    }
                }
                record_type::BOX => {
                    if let Some(shape) = self.read_boundary(record_type::BOXTYPE)? {
                        cell.add_shape(shape);
                    }
                }
                record_type::PATH => {
                    if let Some(shape) = self.read_path()? {
                        cell.add_shape(shape);
                    }
                }
                record_type::SREF | record_type::AREF => {
                    if let Some(inst) = self.read_reference(rec.record_type == record_type::AREF)? {
                        cell.add_instance(inst);
                    }
                }
                record_type::TEXT | record_type::NODE => {
                    self.skip_to_endel()?;
                }
                record_type::ENDSTR => {
                    break;
                }
                _ => {}
            }
        }

        log::debug!(
            "Read cell '{}': {} shapes, {} references",
            cell.name,
            cell.shape_count(),
            cell.instance_count()
        );
        Ok(cell)
    }

    fn read_points(&self, rec: &GdsRecord) -> Vec<Point> {
        rec.as_i32_vec()
            .chunks_exact(2)
            .map(|pair| {
                Point::new(
                    pair[0] as f64 * self.coord_scale,
                    pair[1] as f64 * self.coord_scale,
                )
            })
            .collect()
    }

    /// BOUNDARY and BOX differ only in the record carrying the second key half.
    fn read_boundary(&mut self, type_record: u16) -> Result<Option<Shape>, GdsError> {
        let mut layer: u16 = 0;
        let mut datatype: u16 = 0;
        let mut xy: Option<GdsRecord> = None;

        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::LAYER => {
                    layer = rec.first_i16().unwrap_or(0) as u16;
                }
                t if t == type_record => {
                    datatype = rec.first_i16().unwrap_or(0) as u16;
                }
                record_type::XY => xy = Some(rec),
                record_type::ENDEL => break,
                _ => {}
            }
        }

        let key = LayerKey::new(layer, datatype);
        let Some(xy) = xy.filter(|_| self.filter.accepts(key)) else {
            return Ok(None);
        };

        // GDS boundaries repeat the first point; dedup removes it
        let polygon = Polygon::new(self.read_points(&xy)).dedup();
        if polygon.vertices.is_empty() {
            return Ok(None);
        }
        Ok(Some(Shape::polygon(key, polygon)))
    }

    fn read_path(&mut self) -> Result<Option<Shape>, GdsError> {
        let mut layer: u16 = 0;
        let mut datatype: u16 = 0;
        let mut path_type: i16 = 0;
        let mut width: i32 = 0;
        let mut begin_extn: i32 = 0;
        let mut end_extn: i32 = 0;
        let mut xy: Option<GdsRecord> = None;

        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::LAYER => layer = rec.first_i16().unwrap_or(0) as u16,
                record_type::DATATYPE => datatype = rec.first_i16().unwrap_or(0) as u16,
                record_type::PATHTYPE => path_type = rec.first_i16().unwrap_or(0),
                record_type::WIDTH => width = rec.as_i32_vec().first().copied().unwrap_or(0),
                record_type::BGNEXTN => begin_extn = rec.as_i32_vec().first().copied().unwrap_or(0),
                record_type::ENDEXTN => end_extn = rec.as_i32_vec().first().copied().unwrap_or(0),
                record_type::XY => xy = Some(rec),
                record_type::ENDEL => break,
                _ => {}
            }
        }

        let key = LayerKey::new(layer, datatype);
        let Some(xy) = xy.filter(|_| self.filter.accepts(key)) else {
            return Ok(None);
        };

        let points = self.read_points(&xy);
        if points.is_empty() {
            return Ok(None);
        }

        // Negative width marks an absolute (non-magnifying) width; treated alike.
        let width = f64::from(width).abs() * self.coord_scale;
        let end = PathEnd::from_gds(
            path_type,
            f64::from(begin_extn) * self.coord_scale,
            f64::from(end_extn) * self.coord_scale,
        );
        Ok(Some(Shape::path(key, LayoutPath::new(points, width).with_end(end))))
    }

    fn read_reference(&mut self, arrayed: bool) -> Result<Option<CellInstance>, GdsError> {
        let mut cell_name = String::new();
        let mut transform = Transform::default();
        let mut colrow: (u16, u16) = (1, 1);
        let mut points: Vec<Point> = Vec::new();

        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::SNAME => {
                    cell_name = rec.as_string();
                }
                record_type::STRANS => {
                    let flags = rec.first_i16().unwrap_or(0) as u16;
                    transform.mirror_x = flags & STRANS_REFLECT != 0;
                }
                record_type::MAG => {
                    if let Some(&mag) = rec.as_f64_vec().first() {
                        transform.scale = mag;
                    }
                }
                record_type::ANGLE => {
                    if let Some(&angle) = rec.as_f64_vec().first() {
                        transform.rotation = angle;
                    }
                }
                record_type::COLROW => {
                    let vals = rec.as_i16_vec();
                    if vals.len() >= 2 {
                        colrow = (vals[0].max(0) as u16, vals[1].max(0) as u16);
                    }
                }
                record_type::XY => points = self.read_points(&rec),
                record_type::ENDEL => break,
                _ => {}
            }
        }

        if cell_name.is_empty() || points.is_empty() {
            log::warn!("Skipping reference without name or position");
            return Ok(None);
        }

        transform.offset = points[0];

        if arrayed {
            if points.len() < 3 {
                return Err(GdsError::InvalidRecord {
                    offset: self.offset,
                    message: format!("AREF to '{}' needs three XY points", cell_name),
                });
            }
            let grid = ArrayGrid::from_gds(colrow.0, colrow.1, points[0], points[1], points[2]);
            return Ok(Some(CellInstance::arrayed(&cell_name, transform, grid)));
        }

        Ok(Some(CellInstance::new(&cell_name, transform)))
    }

    fn skip_to_endel(&mut self) -> Result<(), GdsError> {
        loop {
            let rec = self.expect_record()?;
            if rec.record_type == record_type::ENDEL {
                break;
            }
        }
        Ok(())
    }
}

// ── GDS-II Writer ─────────────────────────────────────────────────────

/// Writes a [`Library`] as a GDS-II stream.
///
/// Coordinates in the library are taken to be in user units; they are rounded
/// to the nearest database unit.
pub struct GdsWriter<W: io::Write> {
    writer: W,
    user_units_per_dbu: f64,
    meters_per_dbu: f64,
}

impl<W: io::Write> GdsWriter<W> {
    /// Micrometre user unit, 1nm database unit.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            user_units_per_dbu: 1e-3,
            meters_per_dbu: 1e-9,
        }
    }

    pub fn with_units(mut self, user_units_per_dbu: f64, meters_per_dbu: f64) -> Self {
        self.user_units_per_dbu = user_units_per_dbu;
        self.meters_per_dbu = meters_per_dbu;
        self
    }

    /// Write a Library as a GDS-II stream.
    pub fn write(&mut self, lib: &Library) -> Result<(), GdsError> {
        self.write_i16_record(record_type::HEADER, &[600])?; // GDS version 6
        self.write_i16_record(record_type::BGNLIB, &TIMESTAMP)?;
        self.write_string_record(record_type::LIBNAME, &lib.name)?;
        self.write_real8_record(
            record_type::UNITS,
            &[self.user_units_per_dbu, self.meters_per_dbu],
        )?;

        for cell in lib.all_cells() {
            self.write_cell(cell)?;
        }

        self.write_record(record_type::ENDLIB, &[])?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = data.len() + 4;
        if total_len > u16::MAX as usize {
            return Err(GdsError::InvalidRecord {
                offset: 0,
                message: format!("Record of {} bytes exceeds the 65535-byte limit", total_len),
            });
        }
        self.writer.write_all(&(total_len as u16).to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        if !data.is_empty() {
            self.writer.write_all(data)?;
        }
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        // GDS strings must be even length
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn to_dbu(&self, value: f64) -> i32 {
        (value / self.user_units_per_dbu).round() as i32
    }

    fn point_coords(&self, points: &[Point]) -> Vec<i32> {
        points
            .iter()
            .flat_map(|p| [self.to_dbu(p.x), self.to_dbu(p.y)])
            .collect()
    }

    fn write_cell(&mut self, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &TIMESTAMP)?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;

        for shape in &cell.shapes {
            match &shape.geometry {
                ShapeGeometry::Polygon(poly) => self.write_boundary(shape.key, poly)?,
                ShapeGeometry::Path(path) => self.write_path(shape.key, path)?,
            }
        }

        for inst in &cell.instances {
            self.write_reference(inst)?;
        }

        self.write_record(record_type::ENDSTR, &[])?;
        Ok(())
    }

    fn write_key(&mut self, key: LayerKey, type_record: u16) -> Result<(), GdsError> {
        self.write_i16_record(record_type::LAYER, &[key.number as i16])?;
        self.write_i16_record(type_record, &[key.datatype as i16])
    }

    fn write_boundary(&mut self, key: LayerKey, poly: &Polygon) -> Result<(), GdsError> {
        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_key(key, record_type::DATATYPE)?;

        let mut coords = self.point_coords(&poly.vertices);
        // Close the polygon
        if let Some(first) = poly.vertices.first() {
            coords.push(self.to_dbu(first.x));
            coords.push(self.to_dbu(first.y));
        }

        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_path(&mut self, key: LayerKey, path: &LayoutPath) -> Result<(), GdsError> {
        self.write_record(record_type::PATH, &[])?;
        self.write_key(key, record_type::DATATYPE)?;
        self.write_i16_record(record_type::PATHTYPE, &[path.end.to_gds()])?;
        self.write_i32_record(record_type::WIDTH, &[self.to_dbu(path.width)])?;
        if let PathEnd::Custom { begin, end } = path.end {
            self.write_i32_record(record_type::BGNEXTN, &[self.to_dbu(begin)])?;
            self.write_i32_record(record_type::ENDEXTN, &[self.to_dbu(end)])?;
        }

        let coords = self.point_coords(&path.points);
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_reference(&mut self, inst: &CellInstance) -> Result<(), GdsError> {
        let kind = if inst.array.is_some() {
            record_type::AREF
        } else {
            record_type::SREF
        };
        self.write_record(kind, &[])?;
        self.write_string_record(record_type::SNAME, &inst.cell_name)?;

        let t = &inst.transform;
        if t.mirror_x || t.rotation != 0.0 || t.scale != 1.0 {
            let flags: u16 = if t.mirror_x { STRANS_REFLECT } else { 0 };
            self.write_i16_record(record_type::STRANS, &[flags as i16])?;
            if t.scale != 1.0 {
                self.write_real8_record(record_type::MAG, &[t.scale])?;
            }
            if t.rotation != 0.0 {
                self.write_real8_record(record_type::ANGLE, &[t.rotation])?;
            }
        }

        match &inst.array {
            None => {
                let xy = self.point_coords(&[t.offset]);
                self.write_i32_record(record_type::XY, &xy)?;
            }
            Some(grid) => {
                self.write_i16_record(
                    record_type::COLROW,
                    &[grid.columns as i16, grid.rows as i16],
                )?;
                let cols = f64::from(grid.columns);
                let rows = f64::from(grid.rows);
                let col_corner = t
                    .offset
                    .translate(grid.column_step.x * cols, grid.column_step.y * cols);
                let row_corner = t
                    .offset
                    .translate(grid.row_step.x * rows, grid.row_step.y * rows);
                let xy = self.point_coords(&[t.offset, col_corner, row_corner]);
                self.write_i32_record(record_type::XY, &xy)?;
            }
        }

        self.write_record(record_type::ENDEL, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_to_vec(lib: &Library) -> Vec<u8> {
        let mut buffer: Vec<u8> = Vec::new();
        GdsWriter::new(&mut buffer).write(lib).unwrap();
        buffer
    }

    fn sample_library() -> Library {
        let mut lib = Library::new("test_lib");
        let mut cell = Cell::new("test_cell");
        cell.add_shape(Shape::polygon(
            LayerKey::new(8, 0),
            Polygon::rectangle(0.0, 0.0, 1.0, 0.5),
        ));
        cell.add_shape(Shape::polygon(
            LayerKey::new(8, 2),
            Polygon::rectangle(0.5, 0.25, 2.0, 0.75),
        ));
        cell.add_shape(Shape::path(
            LayerKey::new(10, 0),
            LayoutPath::new(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)], 0.2)
                .with_end(PathEnd::Custom { begin: 0.1, end: 0.3 }),
        ));
        lib.add_cell(cell);
        lib
    }

    #[test]
    fn test_gds_real8_roundtrip() {
        let values = [0.0, 1.0, -1.0, 0.001, 1e-9, 3.14159, 1000.0, 90.0];
        for &v in &values {
            let bytes = f64_to_gds_real8(v);
            let result = gds_real8_to_f64(&bytes);
            assert!(
                (result - v).abs() < v.abs() * 1e-10 + 1e-15,
                "Roundtrip failed for {}: got {}",
                v,
                result
            );
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let buffer = write_to_vec(&sample_library());
        let lib = GdsReader::new(Cursor::new(buffer)).read().unwrap();

        assert_eq!(lib.name, "test_lib");
        assert_eq!(lib.cell_count(), 1);
        let cell = lib.find_cell_by_name("test_cell").unwrap();
        assert_eq!(cell.shape_count(), 3);

        let ShapeGeometry::Path(path) = &cell.shapes[2].geometry else {
            panic!("expected a path");
        };
        let PathEnd::Custom { begin, end } = path.end else {
            panic!("expected custom path ends, got {:?}", path.end);
        };
        assert!((begin - 0.1).abs() < 1e-12);
        assert!((end - 0.3).abs() < 1e-12);
        assert!((path.width - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_filter_skips_other_datatypes() {
        let buffer = write_to_vec(&sample_library());
        let lib = GdsReader::new(Cursor::new(buffer))
            .with_filter(LayerFilter::single(LayerKey::new(8, 0)))
            .read()
            .unwrap();
        let cell = lib.find_cell_by_name("test_cell").unwrap();
        assert_eq!(cell.shape_count(), 1);
        assert_eq!(cell.shapes[0].key, LayerKey::new(8, 0));

        let lib = GdsReader::new(Cursor::new(write_to_vec(&sample_library())))
            .with_filter(LayerFilter::none())
            .read()
            .unwrap();
        assert_eq!(lib.find_cell_by_name("test_cell").unwrap().shape_count(), 0);
    }

    #[test]
    fn test_unit_scale_is_applied() {
        let buffer = write_to_vec(&sample_library());
        // Read in nanometres instead of micrometres.
        let lib = GdsReader::new(Cursor::new(buffer))
            .with_unit_scale(1e-9)
            .read()
            .unwrap();
        let bbox = lib.find_cell_by_name("test_cell").unwrap().shapes[0]
            .bbox()
            .unwrap();
        assert!((bbox.max.x - 1000.0).abs() < 1e-6);
        assert!((bbox.max.y - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_references_roundtrip() {
        let mut lib = Library::new("refs");
        let mut leaf = Cell::new("leaf");
        leaf.add_shape(Shape::polygon(LayerKey::new(1, 0), Polygon::rectangle(0.0, 0.0, 1.0, 1.0)));
        lib.add_cell(leaf);
        let mut top = Cell::new("top");
        top.add_instance(CellInstance::new(
            "leaf",
            Transform {
                offset: Point::new(5.0, 0.0),
                rotation: 90.0,
                mirror_x: true,
                scale: 1.0,
            },
        ));
        let grid = ArrayGrid::from_gds(2, 3, Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 9.0));
        top.add_instance(CellInstance::arrayed("leaf", Transform::default(), grid));
        lib.add_cell(top);

        let read = GdsReader::new(Cursor::new(write_to_vec(&lib))).read().unwrap();
        let top = read.find_cell_by_name("top").unwrap();
        assert_eq!(top.instance_count(), 2);
        assert!(top.instances[0].transform.mirror_x);
        assert!((top.instances[0].transform.rotation - 90.0).abs() < 1e-9);
        assert_eq!(top.instances[1].placements().len(), 6);

        let polys = read.flatten_top_level(Some(LayerKey::new(1, 0))).unwrap();
        assert_eq!(polys.len(), 7);
    }

    #[test]
    fn test_rejects_non_gds() {
        let err = GdsReader::new(Cursor::new(b"not a gds file".to_vec()))
            .read()
            .unwrap_err();
        assert!(err.is_malformed());

        let err = GdsReader::new(Cursor::new(Vec::new())).read().unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let mut buffer = write_to_vec(&sample_library());
        buffer.truncate(buffer.len() - 10);
        let err = GdsReader::new(Cursor::new(buffer)).read().unwrap_err();
        assert!(err.is_malformed(), "unexpected error: {err}");
    }
}
