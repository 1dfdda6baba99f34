use std::{fs::File, io::{BufReader, BufWriter, Read, Write}, path::Path, time::SystemTime};

use chrono::{DateTime, Utc};
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use hike_tracker_lib::{hike_session::{FirstSampleBaseline, HikeSession}, track_point::TrackPoint};
use time::OffsetDateTime;

use crate::{CompletedHike, DataManager, DataManagerError, Difficulty, HikeDetails};

/// A track read from a GPX file.
pub struct GpxTrack {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points: Vec<TrackPoint>,
}

impl DataManager {
    /// Imports a recorded GPX track as a completed hike.
    pub async fn import_gpx(&self, path: &Path, baseline: FirstSampleBaseline) -> Result<CompletedHike, DataManagerError> {
        let file = File::open(path).map_err(|err| DataManagerError::Io(format!("Failed to open {:?}: {err}", path)))?;
        let track = read_gpx(BufReader::new(file))?;

        if track.points.is_empty() {
            return Err(DataManagerError::Gpx(format!("{:?} contains no track points", path)));
        }

        let record = HikeSession::replay(&track.points, baseline)?;

        let fallback_title = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("Imported hike");
        let details = HikeDetails {
            title: track.name.filter(|name| !name.trim().is_empty()).unwrap_or_else(|| fallback_title.to_string()),
            description: track.description.unwrap_or_else(|| "Imported from GPX".to_string()),
            difficulty: Difficulty::default(),
            image_id: None,
        };

        tracing::info!("Imported {} points from {:?}", record.path.len(), path);
        self.save_completed_hike(record, details).await
    }

    pub async fn export_gpx(&self, hike_id: &str, path: &Path) -> Result<(), DataManagerError> {
        let hike = self.get_hike(hike_id).await?;

        let file = File::create(path).map_err(|err| DataManagerError::Io(format!("Failed to create {:?}: {err}", path)))?;
        write_gpx(&hike, BufWriter::new(file))?;

        tracing::info!("Exported hike {} to {:?}", hike_id, path);
        Ok(())
    }
}

fn parse_time(time: &Time) -> Option<DateTime<Utc>> {
    let formatted = time.format().ok()?;
    DateTime::parse_from_rfc3339(&formatted).ok().map(|t| t.with_timezone(&Utc))
}

fn to_gpx_time(time: DateTime<Utc>) -> Time {
    let time: SystemTime = time.into();
    let time: OffsetDateTime = time.into();
    Time::from(time)
}

/// All track points of all tracks and segments, in file order.
/// Points without a time take the time of the closest earlier timed point (or the first timed
/// point when none came before). Only when no point is timed do they fall back to the metadata
/// time, or the epoch if there is none.
pub fn read_gpx<R: Read>(reader: R) -> Result<GpxTrack, DataManagerError> {
    let gpx = gpx::read(reader).map_err(|err| DataManagerError::Gpx(format!("Failed to parse GPX: {err}")))?;

    let mut name = None;
    let mut description = None;
    let mut metadata_time = None;

    if let Some(meta) = gpx.metadata {
        name = meta.name;
        description = meta.description;
        metadata_time = meta.time.as_ref().and_then(parse_time);
    }

    let mut readings = Vec::new();
    for track in gpx.tracks {
        if name.is_none() {
            name = track.name.clone();
        }

        for segment in track.segments {
            for point in segment.points {
                let time = point.time.as_ref().and_then(parse_time);
                let position = point.point();
                readings.push((position.y(), position.x(), point.elevation, time));
            }
        }
    }

    let mut last_time = readings
        .iter()
        .find_map(|(_, _, _, time)| *time)
        .or(metadata_time)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let points = readings
        .into_iter()
        .map(|(latitude, longitude, elevation, time)| {
            let time = time.unwrap_or(last_time);
            last_time = time;
            TrackPoint::from_reading(latitude, longitude, elevation, time.timestamp_millis())
        })
        .collect();

    Ok(GpxTrack {
        name,
        description,
        points,
    })
}

pub fn write_gpx<W: Write>(hike: &CompletedHike, writer: W) -> Result<(), DataManagerError> {
    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;
    gpx.creator = Some("hike_tracker".to_string());

    gpx.metadata = Some(gpx::Metadata {
        name: Some(hike.details.title.clone()),
        description: Some(hike.details.description.clone()),
        time: Some(to_gpx_time(hike.record.started_at)),
        ..Default::default()
    });

    let mut track = Track::new();
    track.name = Some(hike.details.title.clone());
    let mut segment = TrackSegment::new();

    for p in &hike.record.path {
        let mut waypoint = Waypoint::new(Point::new(p.longitude, p.latitude));
        waypoint.elevation = Some(p.altitude);
        waypoint.time = p.captured_at().map(to_gpx_time);
        segment.points.push(waypoint);
    }

    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer).map_err(|err| DataManagerError::Gpx(format!("Failed to write GPX: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <metadata>
    <name>Mols Bjerge</name>
    <time>2025-05-22T10:00:00Z</time>
  </metadata>
  <trk>
    <name>Etape 1</name>
    <trkseg>
      <trkpt lat="56.2300" lon="10.5600"><ele>40.0</ele><time>2025-05-22T10:00:00Z</time></trkpt>
      <trkpt lat="56.2310" lon="10.5600"><ele>55.5</ele><time>2025-05-22T10:01:00Z</time></trkpt>
      <trkpt lat="56.2320" lon="10.5610"><ele>50.0</ele><time>2025-05-22T10:02:30Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn reads_positions_elevation_and_time() {
        let track = read_gpx(SAMPLE.as_bytes()).unwrap();
        assert_eq!(track.name.as_deref(), Some("Mols Bjerge"));
        assert_eq!(track.points.len(), 3);

        let first = track.points[0];
        assert!((first.latitude - 56.23).abs() < 1e-9);
        assert!((first.longitude - 10.56).abs() < 1e-9);
        assert_eq!(first.altitude, 40.);
        assert_eq!(first.captured_at().unwrap().to_rfc3339(), "2025-05-22T10:00:00+00:00");
        assert_eq!(track.points[2].timestamp - first.timestamp, 150_000);
    }

    #[test]
    fn untimed_points_borrow_a_neighbouring_time() {
        let mixed = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="56.0" lon="10.000"><ele>10</ele></trkpt>
      <trkpt lat="56.0" lon="10.001"><ele>12</ele><time>2025-06-01T08:00:00Z</time></trkpt>
      <trkpt lat="56.0" lon="10.002"><ele>14</ele></trkpt>
      <trkpt lat="56.0" lon="10.003"><ele>11</ele><time>2025-06-01T08:05:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

        let track = read_gpx(mixed.as_bytes()).unwrap();
        let times = track.points.iter().map(|p| p.timestamp).collect::<Vec<_>>();
        let start = times[1];
        assert_eq!(times, vec![start, start, start, start + 300_000]);

        let record = HikeSession::replay(&track.points, FirstSampleBaseline::Reading).unwrap();
        assert_eq!(record.duration_sec, 300);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(read_gpx("not xml".as_bytes()), Err(DataManagerError::Gpx(_))));
    }

    #[tokio::test]
    async fn imported_tracks_become_hikes() {
        let dir = std::env::temp_dir().join(format!("hike_tracker_gpx_{}", hex::encode(rand::random::<[u8; 6]>())));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mols.gpx");
        std::fs::write(&path, SAMPLE).unwrap();

        let data_manager = DataManager::in_memory();
        let hike = data_manager.import_gpx(&path, FirstSampleBaseline::Reading).await.unwrap();

        assert_eq!(hike.details.title, "Mols Bjerge");
        assert_eq!(hike.record.duration_sec, 150);
        assert_eq!(hike.record.elevation_gain_m, 15.5);
        assert_eq!(hike.record.max_elevation_m, 55.5);
        assert_eq!(hike.record.path.len(), 3);

        // Exporting and importing again keeps the track
        let exported = dir.join("export.gpx");
        data_manager.export_gpx(&hike.hike_id, &exported).await.unwrap();
        let again = read_gpx(BufReader::new(File::open(&exported).unwrap())).unwrap();
        assert_eq!(again.points.len(), 3);
        assert_eq!(again.name.as_deref(), Some("Mols Bjerge"));
        assert_eq!(again.points[1].altitude, 55.5);
        assert_eq!(again.points[2].timestamp, hike.record.path[2].timestamp);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
