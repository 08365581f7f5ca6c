use std::collections::BTreeMap;

use sqlx::{PgPool, Row};

use crate::model::{PopBucket, PopulationRow};
use crate::store::memory::{CityState, MemoryStore};
use crate::store::CityRow;

/// Persist a whole store into Postgres using COPY FROM STDIN (text format).
///
/// Order respects FK constraints: cities first, then their child tables.
pub async fn save_state(pool: &PgPool, store: &MemoryStore) -> Result<(), sqlx::Error> {
    // Cities
    {
        let mut buf = String::new();
        for state in store.cities() {
            buf.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                state.row.id,
                escape(&state.row.name),
                state.row.x,
                state.row.y,
                state.row.ai,
            ));
        }
        copy_in(pool, include_str!("../../sql/copy_cities.sql"), &buf).await?;
    }

    // Resource stocks
    {
        let mut buf = String::new();
        for state in store.cities() {
            for (resource, amount) in &state.inventory {
                buf.push_str(&format!(
                    "{}\t{}\t{}\n",
                    state.row.id,
                    escape(resource),
                    amount,
                ));
            }
        }
        copy_in(pool, include_str!("../../sql/copy_resources.sql"), &buf).await?;
    }

    // Population buckets
    {
        let mut buf = String::new();
        for state in store.cities() {
            for (bucket, row) in &state.population {
                buf.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    state.row.id,
                    bucket.as_str(),
                    row.current,
                    row.max,
                    row.occupied,
                ));
            }
        }
        copy_in(pool, include_str!("../../sql/copy_population.sql"), &buf).await?;
    }

    // Building levels
    {
        let mut buf = String::new();
        for state in store.cities() {
            for (building, level) in &state.buildings {
                buf.push_str(&format!(
                    "{}\t{}\t{}\n",
                    state.row.id,
                    escape(building),
                    level,
                ));
            }
        }
        copy_in(pool, include_str!("../../sql/copy_buildings.sql"), &buf).await?;
    }

    // Base prices
    {
        let mut buf = String::new();
        for (resource, price) in store.prices() {
            buf.push_str(&format!("{}\t{}\n", escape(resource), price));
        }
        copy_in(pool, include_str!("../../sql/copy_prices.sql"), &buf).await?;
    }

    Ok(())
}

/// Rehydrate a [`MemoryStore`] from Postgres. Unknown bucket strings are a
/// data error, not a default: the row is rejected.
pub async fn load_state(pool: &PgPool) -> Result<MemoryStore, sqlx::Error> {
    let mut store = MemoryStore::new();
    let mut states: BTreeMap<u64, CityState> = BTreeMap::new();

    let cities = sqlx::query("SELECT id, name, x, y, ai FROM cities ORDER BY id")
        .fetch_all(pool)
        .await?;
    for row in cities {
        let id = row.get::<i64, _>("id") as u64;
        states.insert(
            id,
            CityState {
                row: CityRow {
                    id,
                    name: row.get("name"),
                    x: row.get("x"),
                    y: row.get("y"),
                    ai: row.get("ai"),
                },
                inventory: BTreeMap::new(),
                population: BTreeMap::new(),
                buildings: BTreeMap::new(),
            },
        );
    }

    let resources = sqlx::query("SELECT city_id, resource, amount FROM city_resources")
        .fetch_all(pool)
        .await?;
    for row in resources {
        let city = row.get::<i64, _>("city_id") as u64;
        if let Some(state) = states.get_mut(&city) {
            state
                .inventory
                .insert(row.get("resource"), row.get::<i64, _>("amount"));
        }
    }

    let population =
        sqlx::query("SELECT city_id, bucket, current, capacity, occupied FROM city_population")
            .fetch_all(pool)
            .await?;
    for row in population {
        let city = row.get::<i64, _>("city_id") as u64;
        let bucket_str: String = row.get("bucket");
        let bucket = PopBucket::from_str(&bucket_str).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown population bucket {bucket_str:?}").into())
        })?;
        if let Some(state) = states.get_mut(&city) {
            state.population.insert(
                bucket,
                PopulationRow {
                    current: row.get::<i32, _>("current") as u32,
                    max: row.get::<i32, _>("capacity") as u32,
                    occupied: row.get::<i32, _>("occupied") as u32,
                },
            );
        }
    }

    let buildings = sqlx::query("SELECT city_id, building, level FROM city_buildings")
        .fetch_all(pool)
        .await?;
    for row in buildings {
        let city = row.get::<i64, _>("city_id") as u64;
        if let Some(state) = states.get_mut(&city) {
            state
                .buildings
                .insert(row.get("building"), row.get::<i32, _>("level") as u32);
        }
    }

    let prices = sqlx::query("SELECT resource, base_price FROM resource_prices")
        .fetch_all(pool)
        .await?;
    for row in prices {
        let resource: String = row.get("resource");
        store.set_base_price(&resource, row.get::<f64, _>("base_price"));
    }

    for (_, state) in states {
        store.restore_city(state);
    }
    Ok(store)
}

/// Execute a COPY FROM STDIN with the given text-format payload.
async fn copy_in(pool: &PgPool, statement: &str, data: &str) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    let mut copy = conn.copy_in_raw(statement).await?;
    copy.send(data.as_bytes()).await?;
    copy.finish().await?;
    Ok(())
}

/// Escape a string for Postgres COPY text format.
/// Backslash must be escaped first, then the special whitespace characters.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
