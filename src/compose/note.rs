use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

use super::{FRONTMATTER_DELIMITER, NOTE_EXTENSION};
use crate::error::PipelineError;
use crate::model::CenterPoint;
use crate::request::{PropertyKind, PropertySpec, TravelRequest};

/// AMap road tiles; `{s}` cycles through [`TILE_SUBDOMAINS`].
const TILE_SERVER: &str = "http://webrd0{s}.is.autonavi.com/appmaptile?lang=zh_cn&size=1&scale=1&style=8&x={x}&y={y}&z={z}";
const TILE_SUBDOMAINS: &str = r#"["1", "2", "3", "4"]"#;
const MAP_HEIGHT: &str = "500px";
const MAP_WIDTH: &str = "100%";
const DEFAULT_ZOOM: u8 = 16;
const MAX_ZOOM: u8 = 18;
const MIN_ZOOM: u8 = 1;
const UNIT: &str = "meters";
const SCALE: u8 = 1;

/// The embedded map configuration block of a trip note.
#[derive(Debug, Clone, PartialEq)]
pub struct MapBlock {
    pub id: String,
    pub center: CenterPoint,
    pub marker_folder: String,
}

impl MapBlock {
    /// `library_path` is the trip's parent folder relative to the note library root.
    pub fn new(request: &TravelRequest, center: CenterPoint, library_path: &str) -> Self {
        let library_path = library_path.trim_matches(['/', '\\']);
        let marker_folder = if library_path.is_empty() {
            format!("{}/markers", request.trip_name)
        } else {
            format!("{library_path}/{}/markers", request.trip_name)
        };
        Self {
            id: request.trip_date.clone(),
            center,
            marker_folder,
        }
    }

    fn render(&self, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "```leaflet\n\
             id: {id}\n\
             osmLayer: false\n\
             tileServer: {TILE_SERVER}\n\
             tileSubdomains: {TILE_SUBDOMAINS}\n\
             lat: {lat}\n\
             long: {long}\n\
             height: {MAP_HEIGHT}\n\
             width: {MAP_WIDTH}\n\
             defaultZoom: {DEFAULT_ZOOM}\n\
             maxzoom: {MAX_ZOOM}\n\
             minzoom: {MIN_ZOOM}\n\
             unit: {UNIT}\n\
             scale: {SCALE}\n\
             markerFolder: {folder}\n\
             ```\n",
            id = self.id,
            lat = self.center.latitude,
            long = self.center.longitude,
            folder = self.marker_folder,
        );
    }
}

fn render_property(out: &mut String, property: &PropertySpec) {
    match property.kind {
        PropertyKind::List => {
            out.push_str(&property.name);
            out.push_str(":\n");
            for item in property.value.split(',') {
                out.push_str("  - ");
                out.push_str(item.trim());
                out.push('\n');
            }
        }
        PropertyKind::Tags
        | PropertyKind::Aliases
        | PropertyKind::CssClasses
        | PropertyKind::Text
        | PropertyKind::Number
        | PropertyKind::Checkbox
        | PropertyKind::Date => {
            out.push_str(&property.name);
            out.push_str(": ");
            out.push_str(&property.value);
            out.push('\n');
        }
    }
}

/// Render the aggregate trip note: property frontmatter, then one map block.
pub fn render_note(request: &TravelRequest, map: &MapBlock) -> String {
    let mut out = String::new();
    out.push_str(FRONTMATTER_DELIMITER);
    out.push('\n');
    for property in &request.properties {
        render_property(&mut out, property);
    }
    out.push_str(FRONTMATTER_DELIMITER);
    out.push_str("\n\n");
    map.render(&mut out);
    out
}

/// Write `<output>/<trip>/<trip>.md`, replacing any previous version.
pub fn write_note(request: &TravelRequest, map: &MapBlock) -> Result<PathBuf, PipelineError> {
    let dir = request.trip_dir();
    fs::create_dir_all(&dir).map_err(|e| PipelineError::output(&dir, e))?;

    let path = dir.join(format!("{}.{NOTE_EXTENSION}", request.trip_name));
    let contents = render_note(request, map);
    fs::write(&path, contents).map_err(|e| PipelineError::output(&path, e))?;
    log::info!("Trip note written: {}", path.display());
    Ok(path)
}
