//! Analytics event models and queries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Client-reported event; `props` is stored as JSON text.
#[derive(Debug, Deserialize)]
pub struct TrackEventRequest {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub props: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsSummaryQuery {
    /// Only count events at or after this RFC 3339 timestamp
    pub since: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub total: i64,
    pub events: Vec<EventCount>,
}

/// Insert an analytics event
pub async fn record_event(
    db: &SqlitePool,
    name: &str,
    path: Option<&str>,
    user_id: Option<&str>,
    locale: Option<&str>,
    props: Option<&serde_json::Value>,
) -> Result<String, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let props_json = props.map(|p| p.to_string());

    sqlx::query(
        r#"
        INSERT INTO analytics_events (id, name, path, user_id, locale, props, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(name)
    .bind(path)
    .bind(user_id)
    .bind(locale)
    .bind(&props_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(event = name, user_id = user_id, "Analytics event recorded");

    Ok(id)
}

/// Count events by name, most frequent first.
///
/// `since` is compared through `julianday()` so stored timestamps match
/// regardless of offset or fractional-second width.
pub async fn summarize_events(
    db: &SqlitePool,
    since: Option<DateTime<Utc>>,
) -> Result<AnalyticsSummary, sqlx::Error> {
    let since = since.map(|s| s.to_rfc3339_opts(SecondsFormat::Micros, false));
    let where_clause = if since.is_some() {
        "WHERE julianday(created_at) >= julianday(?)"
    } else {
        ""
    };

    let sql = format!(
        "SELECT name, COUNT(*) AS count FROM analytics_events {} GROUP BY name ORDER BY count DESC, name ASC",
        where_clause
    );
    let mut q = sqlx::query_as::<_, EventCount>(&sql);
    if let Some(since) = &since {
        q = q.bind(since);
    }
    let events = q.fetch_all(db).await?;
    let total = events.iter().map(|e| e.count).sum();

    Ok(AnalyticsSummary { total, events })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_summarize() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();

        record_event(&pool, "page_view", Some("/"), None, Some("pl"), None)
            .await
            .unwrap();
        record_event(&pool, "page_view", Some("/works"), None, Some("en"), None)
            .await
            .unwrap();
        let props = serde_json::json!({ "workId": "w1" });
        record_event(&pool, "favorite.add", None, None, None, Some(&props))
            .await
            .unwrap();

        let summary = summarize_events(&pool, None).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.events[0].name, "page_view");
        assert_eq!(summary.events[0].count, 2);

        let future = "2999-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let summary = summarize_events(&pool, Some(future)).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.events.is_empty());

        // Same instant as stored rows, expressed east of UTC
        let offset = chrono::FixedOffset::east_opt(5 * 3600).unwrap();
        let hour_ago = (Utc::now() - chrono::Duration::hours(1)).with_timezone(&offset);
        let summary = summarize_events(&pool, Some(hour_ago.with_timezone(&Utc)))
            .await
            .unwrap();
        assert_eq!(summary.total, 3);

        let just_now = Utc::now() + chrono::Duration::milliseconds(50);
        let summary = summarize_events(&pool, Some(just_now)).await.unwrap();
        assert_eq!(summary.total, 0);
    }
}
