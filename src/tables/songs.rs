//! Songs and artists tables
//!
//! Both tables are straight projections of the song dataset. Nothing is
//! deduplicated: repeated `song_id` or `artist_id` values are written as they
//! appear in the input.

use super::{DerivedTable, TableDef, SONG_DATA};
use crate::error::Result;
use crate::output::{format_schema, Location, TableWriteResult, TableWriter};
use crate::session::Session;

/// Songs, ordered by id and partitioned by year and artist
pub const SONGS: TableDef = TableDef {
    name: "songs",
    query: r#"
        SELECT song_id, title, artist_id, "year", duration
        FROM song_data
        ORDER BY song_id
    "#,
    order_by: "song_id",
    partition_by: &["year", "artist_id"],
};

/// Artists, ordered by id descending
pub const ARTISTS: TableDef = TableDef {
    name: "artists",
    query: r"
        SELECT
            artist_id AS artist_id,
            artist_name AS name,
            artist_location AS location,
            artist_latitude AS latitude,
            artist_longitude AS longitude
        FROM song_data
        ORDER BY artist_id DESC
    ",
    order_by: "artist_id DESC",
    partition_by: &[],
};

/// Tables derived from the song dataset
#[derive(Debug, Clone)]
pub struct SongTables {
    pub songs: DerivedTable,
    pub artists: DerivedTable,
}

/// Load the song dataset and derive the songs and artists tables
pub fn derive_song_tables(session: &Session, song_data: &Location) -> Result<SongTables> {
    let rows = session.load_json(SONG_DATA, song_data, None)?;
    tracing::info!("Song data: {rows} records from {song_data}");
    let schema = session.schema(SONG_DATA)?;
    tracing::info!("Song data schema:\n{}", format_schema(&schema));

    Ok(SongTables {
        songs: SONGS.derive(session)?,
        artists: ARTISTS.derive(session)?,
    })
}

/// Derive and write the songs and artists tables
pub fn process_song_data(
    session: &Session,
    song_data: &Location,
    writer: &TableWriter<'_>,
) -> Result<Vec<TableWriteResult>> {
    let tables = derive_song_tables(session, song_data)?;
    Ok(vec![
        writer.write(&tables.songs)?,
        writer.write(&tables.artists)?,
    ])
}
