use super::Alert;
use crate::tft::recap::{gains, losses};
use crate::tft::{QueueType, RankSnapshot, RecapMode, RecapRow};

const WIN_COLOUR: u32 = 0x2dcf71;
const LOSS_COLOUR: u32 = 0xf34e3c;
const NEUTRAL_COLOUR: u32 = 0x5865f2;

const MAX_GAIN_LINES: usize = 25;
const MAX_LOSS_LINES: usize = 10;
/// Discord rejects embed field values above this many characters.
const FIELD_LIMIT: usize = 1024;

/// What the poller knows about one finished match of one account.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub game_name: String,
    pub tag_line: String,
    pub match_id: String,
    pub queue: QueueType,
    /// Normalized placement, `None` when the participant had no valid one.
    pub placement: Option<u8>,
    /// LP change, only known for the last ranked match of a batch.
    pub delta: Option<i32>,
    pub rank_after: Option<RankSnapshot>,
    pub thumbnail: Option<String>,
}

impl MatchOutcome {
    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.game_name, self.tag_line)
    }
}

pub fn placement_ordinal(placement: u8) -> String {
    let suffix = match (placement % 10, placement % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{placement}{suffix}")
}

pub fn format_delta(delta: i32) -> String {
    if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}

/// League of Graphs page of a match id such as `EUW1_7349112729`.
pub fn match_url(match_id: &str) -> Option<String> {
    let (platform, numeric_id) = match_id.split_once('_')?;
    let shard = platform.to_lowercase();
    let shard = shard.trim_end_matches(|c: char| c.is_ascii_digit());
    if shard.is_empty() || numeric_id.is_empty() {
        return None;
    }

    Some(format!(
        "https://www.leagueofgraphs.com/tft/match/{shard}/{numeric_id}"
    ))
}

pub fn match_alert(outcome: &MatchOutcome) -> Alert {
    let label = outcome.queue.label();
    let riot_id = outcome.riot_id();
    let ranked = outcome.queue.is_ranked();

    // Double Up placements are already folded onto 1-4.
    let top_half = match outcome.queue {
        QueueType::RankedTftDoubleUp => 2,
        _ => 4,
    };

    let (title, colour, description) = match outcome.placement {
        Some(p) if p <= top_half => (
            format!("{label} win for {riot_id}"),
            WIN_COLOUR,
            format!("**{riot_id}** finished **{}**.", placement_ordinal(p)),
        ),
        Some(p) => (
            format!("{label} loss for {riot_id}"),
            LOSS_COLOUR,
            format!("**{riot_id}** finished **{}**.", placement_ordinal(p)),
        ),
        None => (
            format!("{label} result for {riot_id}"),
            NEUTRAL_COLOUR,
            "Match completed.".to_string(),
        ),
    };

    let lp_change = match (ranked, outcome.delta) {
        (true, Some(delta)) => format!("{} LP", format_delta(delta)),
        _ => "—".to_string(),
    };
    let rank = match (&outcome.rank_after, ranked) {
        (Some(rank), true) => rank.to_string(),
        _ => "—".to_string(),
    };

    Alert {
        title,
        description: Some(description),
        url: match_url(&outcome.match_id),
        colour,
        thumbnail: if ranked { outcome.thumbnail.clone() } else { None },
        footer: Some(outcome.match_id.clone()),
        ..Default::default()
    }
    .field(
        "Placement",
        outcome
            .placement
            .map(placement_ordinal)
            .unwrap_or_else(|| "Unknown".to_string()),
        true,
    )
    .field("LP Change", lp_change, true)
    .field("Rank", rank, true)
}

fn medal(index: usize) -> String {
    match index {
        0 => "🥇".to_string(),
        1 => "🥈".to_string(),
        2 => "🥉".to_string(),
        _ => format!("{}.", index + 1),
    }
}

fn recap_lines(rows: &[&RecapRow], limit: usize) -> String {
    let lines: Vec<String> = rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, row)| {
            let games = if row.games > 0 {
                format!(" ({} games)", row.games)
            } else {
                String::new()
            };
            format!("{} **{}** {}{}", medal(i), row.name, format_delta(row.delta), games)
        })
        .collect();

    if lines.is_empty() {
        return "—".to_string();
    }

    let mut text = String::new();
    for line in lines {
        if text.chars().count() + line.chars().count() + 1 > FIELD_LIMIT {
            break;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&line);
    }
    text
}

pub fn recap_alert(rows: &[RecapRow], mode: RecapMode, queue: QueueType) -> Alert {
    let total_games: u32 = rows.iter().map(|r| r.games).sum();

    Alert {
        title: format!("{} Recap", mode.label()),
        colour: NEUTRAL_COLOUR,
        footer: Some(format!(
            "{} players | {} games • {} • last {}h",
            rows.len(),
            total_games,
            queue.label(),
            mode.window_hours()
        )),
        ..Default::default()
    }
    .field("Top gains", recap_lines(&gains(rows), MAX_GAIN_LINES), true)
    .field("Top losses", recap_lines(&losses(rows), MAX_LOSS_LINES), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(queue: QueueType, placement: Option<u8>, delta: Option<i32>) -> MatchOutcome {
        MatchOutcome {
            game_name: "Chalop".into(),
            tag_line: "3012".into(),
            match_id: "EUW1_7349112729".into(),
            queue,
            placement,
            delta,
            rank_after: Some(RankSnapshot {
                tier: Some("GOLD".into()),
                rank: Some("II".into()),
                lp: Some(45),
                wins: 0,
                losses: 0,
                last_updated_at: Some(1),
            }),
            thumbnail: Some("https://cdn/gold.png".into()),
        }
    }

    #[test]
    fn ordinals() {
        assert_eq!(placement_ordinal(1), "1st");
        assert_eq!(placement_ordinal(2), "2nd");
        assert_eq!(placement_ordinal(3), "3rd");
        assert_eq!(placement_ordinal(4), "4th");
        assert_eq!(placement_ordinal(8), "8th");
    }

    #[test]
    fn match_links_use_the_shard() {
        assert_eq!(
            match_url("EUW1_7349112729").as_deref(),
            Some("https://www.leagueofgraphs.com/tft/match/euw/7349112729")
        );
        assert_eq!(
            match_url("KR_123").as_deref(),
            Some("https://www.leagueofgraphs.com/tft/match/kr/123")
        );
        assert_eq!(match_url("garbage"), None);
    }

    #[test]
    fn ranked_win_shows_lp_and_rank() {
        let alert = match_alert(&outcome(QueueType::RankedTft, Some(2), Some(38)));

        assert_eq!(alert.colour, WIN_COLOUR);
        assert_eq!(alert.title, "Ranked win for Chalop#3012");
        assert_eq!(alert.fields[0].value, "2nd");
        assert_eq!(alert.fields[1].value, "+38 LP");
        assert_eq!(alert.fields[2].value, "GOLD II - 45 LP");
        assert_eq!(alert.thumbnail.as_deref(), Some("https://cdn/gold.png"));
    }

    #[test]
    fn missing_delta_is_not_shown_as_zero() {
        let alert = match_alert(&outcome(QueueType::RankedTft, Some(7), None));

        assert_eq!(alert.colour, LOSS_COLOUR);
        assert_eq!(alert.fields[1].value, "—");
    }

    #[test]
    fn double_up_third_is_a_loss() {
        let alert = match_alert(&outcome(QueueType::RankedTftDoubleUp, Some(3), Some(-15)));

        assert_eq!(alert.colour, LOSS_COLOUR);
        assert_eq!(alert.fields[1].value, "-15 LP");
    }

    #[test]
    fn normal_games_hide_ranked_details() {
        let alert = match_alert(&outcome(QueueType::NormalTft, None, Some(10)));

        assert_eq!(alert.colour, NEUTRAL_COLOUR);
        assert_eq!(alert.fields[0].value, "Unknown");
        assert_eq!(alert.fields[1].value, "—");
        assert_eq!(alert.fields[2].value, "—");
        assert_eq!(alert.thumbnail, None);
    }

    #[test]
    fn recap_lists_gains_and_losses() {
        let rows = vec![
            RecapRow { name: "A#1".into(), games: 3, delta: 60 },
            RecapRow { name: "B#1".into(), games: 2, delta: -25 },
            RecapRow { name: "C#1".into(), games: 0, delta: 0 },
        ];

        let alert = recap_alert(&rows, RecapMode::Daily, QueueType::RankedTft);

        assert_eq!(alert.title, "Daily Recap");
        assert_eq!(alert.fields[0].value, "🥇 **A#1** +60 (3 games)");
        assert_eq!(alert.fields[1].value, "🥇 **B#1** -25 (2 games)");
        assert_eq!(
            alert.footer.as_deref(),
            Some("3 players | 5 games • Ranked • last 24h")
        );
    }

    #[test]
    fn empty_recap_uses_placeholders() {
        let alert = recap_alert(&[], RecapMode::Weekly, QueueType::RankedTftDoubleUp);

        assert_eq!(alert.fields[0].value, "—");
        assert_eq!(alert.fields[1].value, "—");
        assert!(alert.footer.unwrap().ends_with("last 168h"));
    }
}
