use chrono::NaiveDate;
use serde_json::Value;

use crate::raw_table::{RawRow, RawTable, as_f64_any};
use crate::record::PlayerGameRecord;
use crate::season::season_label;

/// Minutes played from `"MM:SS"`, `"PT34M12.00S"`, a numeric string or a
/// number. Only the whole-minute part is kept; anything unreadable is `None`.
pub fn parse_minutes(v: &Value) -> Option<u32> {
    match v {
        Value::Number(_) => whole_minutes(v.as_f64()?),
        Value::String(s) => parse_minutes_str(s),
        _ => None,
    }
}

fn parse_minutes_str(raw: &str) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(rest) = s.strip_prefix("PT") {
        let (mins, _) = rest.split_once('M')?;
        return whole_minutes(mins.parse::<f64>().ok()?);
    }
    let head = match s.split_once(':') {
        Some((mins, _)) => mins,
        None => s,
    };
    whole_minutes(head.trim().parse::<f64>().ok()?)
}

fn whole_minutes(n: f64) -> Option<u32> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    u32::try_from(n.floor() as i64).ok()
}

/// Maps one game's box score onto stored records. Did-not-play rows (no or
/// zero minutes) and rows without a player id are dropped; the rest keep
/// upstream order.
pub fn normalize_boxscore(
    table: &RawTable,
    game_date: NaiveDate,
    fallback_game_id: &str,
) -> Vec<PlayerGameRecord> {
    let season = season_label(game_date);
    table
        .iter_rows()
        .filter_map(|row| normalize_row(&row, game_date, fallback_game_id, &season))
        .collect()
}

fn normalize_row(
    row: &RawRow<'_>,
    game_date: NaiveDate,
    fallback_game_id: &str,
    season: &str,
) -> Option<PlayerGameRecord> {
    let minutes = row.get("MIN").and_then(parse_minutes)?;
    if minutes == 0 {
        return None;
    }
    let player_id = row.i64("PLAYER_ID").filter(|id| *id > 0)?;

    let game_id = row
        .get("GAME_ID")
        .and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_game_id.to_string());

    let fg_attempts = attempts(row, "FGA");
    let ft_attempts = attempts(row, "FTA");

    Some(PlayerGameRecord {
        game_date,
        game_id,
        player_id,
        player_name: row.str("PLAYER_NAME").unwrap_or_default().to_string(),
        team_abbr: row.str("TEAM_ABBREVIATION").unwrap_or_default().to_string(),
        minutes,
        pts: count(row, &["PTS"]),
        reb: count(row, &["REB"]),
        ast: count(row, &["AST"]),
        stl: count(row, &["STL"]),
        blk: count(row, &["BLK"]),
        fg3m: count(row, &["FG3M"]),
        turnovers: count(row, &["TO", "TOV"]),
        fg_pct: percentage(row, "FG_PCT", fg_attempts),
        ft_pct: percentage(row, "FT_PCT", ft_attempts),
        fg_attempts,
        ft_attempts,
        z_score: 0.0,
        season: season.to_string(),
    })
}

fn count(row: &RawRow<'_>, names: &[&str]) -> f64 {
    row.first_of(names)
        .and_then(as_f64_any)
        .map(|n| n.max(0.0))
        .unwrap_or(0.0)
}

fn attempts(row: &RawRow<'_>, name: &str) -> u32 {
    row.f64(name)
        .filter(|n| *n > 0.0)
        .map(|n| n.round() as u32)
        .unwrap_or(0)
}

fn percentage(row: &RawRow<'_>, name: &str, attempts: u32) -> Option<f64> {
    if attempts == 0 {
        return None;
    }
    row.f64(name).filter(|p| (0.0..=1.0).contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minutes_formats() {
        assert_eq!(parse_minutes(&json!("34:12")), Some(34));
        assert_eq!(parse_minutes(&json!("34.000000:12")), Some(34));
        assert_eq!(parse_minutes(&json!("PT27M45.00S")), Some(27));
        assert_eq!(parse_minutes(&json!(31.9)), Some(31));
        assert_eq!(parse_minutes(&json!("18")), Some(18));
        assert_eq!(parse_minutes(&json!("")), None);
        assert_eq!(parse_minutes(&json!("DNP - Coach's Decision")), None);
        assert_eq!(parse_minutes(&json!(-3)), None);
        assert_eq!(parse_minutes(&Value::Null), None);
    }

    fn table() -> RawTable {
        let headers = [
            "GAME_ID", "TEAM_ABBREVIATION", "PLAYER_ID", "PLAYER_NAME", "MIN", "FGA", "FG_PCT",
            "FG3M", "FTA", "FT_PCT", "REB", "AST", "STL", "BLK", "TO", "PTS", "PLUS_MINUS",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        RawTable::new(
            headers,
            vec![
                vec![
                    json!("0022400500"), json!("BOS"), json!(1628369), json!("Jayson Tatum"),
                    json!("38:05"), json!(22), json!(0.5), json!(4), json!(6), json!(0.833),
                    json!(9), json!(5), json!(1), json!(0), json!(3), json!(31), json!(12),
                ],
                vec![
                    json!("0022400500"), json!("BOS"), json!(201950), json!("Jrue Holiday"),
                    json!(null), json!(null), json!(null), json!(null), json!(null),
                    json!(null), json!(null), json!(null), json!(null), json!(null),
                    json!(null), json!(null), json!(null),
                ],
                vec![
                    json!("0022400500"), json!("BOS"), json!(1630202), json!("Payton Pritchard"),
                    json!("0:42"), json!(0), json!(0.0), json!(0), json!(0), json!(0.0),
                    json!(0), json!(0), json!(0), json!(0), json!(0), json!(0), json!(0),
                ],
                vec![
                    json!("0022400500"), json!("BOS"), json!(1629057), json!("Sam Hauser"),
                    json!("12:00"), json!(null), json!(null), json!(2), json!(null),
                    json!(null), json!(2), json!(null), json!(null), json!(null),
                    json!(null), json!(6), json!(null),
                ],
            ],
        )
    }

    #[test]
    fn drops_did_not_play_rows_and_keeps_order() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let rows = normalize_boxscore(&table(), date, "fallback");
        let names = rows.iter().map(|r| r.player_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Jayson Tatum", "Sam Hauser"]);
        assert!(rows.iter().all(|r| r.minutes > 0));
        assert!(rows.iter().all(|r| r.season == "2024-25"));
    }

    #[test]
    fn projects_fixed_columns_and_defaults_missing() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let rows = normalize_boxscore(&table(), date, "fallback");
        let tatum = &rows[0];
        assert_eq!(tatum.game_id, "0022400500");
        assert_eq!(tatum.team_abbr, "BOS");
        assert_eq!(tatum.minutes, 38);
        assert_eq!(tatum.pts, 31.0);
        assert_eq!(tatum.turnovers, 3.0);
        assert_eq!(tatum.fg_pct, Some(0.5));
        assert_eq!(tatum.fg_attempts, 22);
        assert_eq!(tatum.ft_attempts, 6);

        let hauser = &rows[1];
        assert_eq!(hauser.fg_attempts, 0);
        assert_eq!(hauser.ft_attempts, 0);
        assert_eq!(hauser.fg_pct, None);
        assert_eq!(hauser.ast, 0.0);
        assert_eq!(hauser.fg3m, 2.0);
    }

    #[test]
    fn missing_game_id_uses_requested_id() {
        let table = RawTable::new(
            vec!["PLAYER_ID".into(), "MIN".into(), "TOV".into()],
            vec![vec![json!(5), json!("20:00"), json!(4)]],
        );
        let date = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        let rows = normalize_boxscore(&table, date, "0022400123");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].game_id, "0022400123");
        assert_eq!(rows[0].turnovers, 4.0);
        assert_eq!(rows[0].season, "2024-25");
    }
}
