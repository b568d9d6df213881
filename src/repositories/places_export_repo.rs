use std::path::PathBuf;

use anyhow::Context;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::place::Place;

/// Best-effort spreadsheet-style export of the latest query result. The
/// caller logs and swallows failures; a query must never fail because this
/// write did.
pub struct PlacesExportRepo {
    export_path: PathBuf,
}

impl PlacesExportRepo {
    pub fn new(export_path: PathBuf) -> Self {
        Self { export_path }
    }

    pub async fn store_snapshot(&self, places: Vec<Place>) -> anyhow::Result<()> {
        let exported_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("Failed to format export timestamp")?;

        let mut sheet = String::from(
            "exported_at,name,category,lat,lon,distance_meters,opening_hours,cuisine,phone,website,email,address\n",
        );
        for place in &places {
            sheet.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{}\n",
                exported_at,
                csv_field(&place.name),
                place.category.as_amenity(),
                place.location.lat,
                place.location.lon,
                place.distance_meters,
                csv_optional(&place.opening_hours),
                csv_optional(&place.cuisine),
                csv_optional(&place.phone),
                csv_optional(&place.website),
                csv_optional(&place.email),
                csv_optional(&place.address),
            ));
        }

        tokio::fs::write(&self.export_path, sheet)
            .await
            .with_context(|| {
                format!(
                    "Failed to write places snapshot to {}",
                    self.export_path.display()
                )
            })
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_optional(value: &Option<String>) -> String {
    value.as_deref().map(csv_field).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::place::{Category, Coordinate};

    #[test]
    fn quotes_fields_containing_separators() {
        assert_eq!(csv_field("Banh Mi 25"), "Banh Mi 25");
        assert_eq!(csv_field("25, Hang Ca"), "\"25, Hang Ca\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn snapshot_writes_a_header_and_one_row_per_place() {
        let path = std::env::temp_dir().join("nearby-eats-export-test.csv");
        let repo = PlacesExportRepo::new(path.clone());
        let place = Place {
            name: "Pho Thin".to_string(),
            location: Coordinate {
                lat: 21.03,
                lon: 105.80,
            },
            distance_meters: 450,
            category: Category::Restaurant,
            opening_hours: Some("06:00-21:00".to_string()),
            cuisine: None,
            phone: None,
            website: None,
            email: None,
            address: Some("13, Lo Duc, Hanoi".to_string()),
        };

        repo.store_snapshot(vec![place]).await.unwrap();

        let sheet = tokio::fs::read_to_string(&path).await.unwrap();
        let mut lines = sheet.lines();
        assert!(lines.next().unwrap().starts_with("exported_at,name,category"));
        let row = lines.next().unwrap();
        assert!(row.contains("Pho Thin,restaurant,21.03,105.8,450"));
        assert!(row.contains("\"13, Lo Duc, Hanoi\""));
        assert_eq!(lines.next(), None);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
