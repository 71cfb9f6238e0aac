use anyhow::{Context, Result};

use timbre_core::TrackId;
use timbre_ingest::{build_engine, Config, RecommendationPage};

pub fn run_recommend(
    config: &Config,
    track_id: u64,
    page: i64,
    page_size: i64,
    json: bool,
) -> Result<()> {
    let engine = build_engine(config).context("Failed to open the recommendation engine")?;
    let track_id = TrackId::new(track_id);

    let result = match engine.recommend_page(track_id, page, page_size) {
        Ok(result) => result,
        Err(e) if e.is_unknown_track() => {
            anyhow::bail!("Track {track_id} is not in the index");
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render(&result));
    }

    Ok(())
}

fn render(result: &RecommendationPage) -> String {
    let mut out = format!(
        "\nTracks similar to {} (page {}, {} per page)\n\n",
        result.track_id, result.page, result.page_size
    );
    if result.ids.is_empty() {
        out.push_str("  No results on this page\n");
    }
    let ranked: String = result
        .ids
        .iter()
        .enumerate()
        .map(|(rank, id)| format!("  {:>4}. {id}\n", result.offset.saturating_add(rank + 1)))
        .collect();
    out.push_str(&ranked);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: usize, offset: usize, ids: &[u64]) -> RecommendationPage {
        RecommendationPage {
            track_id: TrackId::new(1),
            page,
            page_size: 10,
            offset,
            ids: ids.iter().copied().map(TrackId::new).collect(),
        }
    }

    #[test]
    fn test_render_ranks_from_offset() {
        let text = render(&page(2, 10, &[7, 3]));
        assert!(text.contains("page 2, 10 per page"));
        assert!(text.contains("  11. 7"));
        assert!(text.contains("  12. 3"));
    }

    #[test]
    fn test_render_huge_page() {
        let text = render(&page(usize::MAX, usize::MAX, &[]));
        assert!(text.contains("No results on this page"));

        // Ranks saturate instead of overflowing.
        let text = render(&page(usize::MAX, usize::MAX, &[4]));
        assert!(text.contains(&format!("{}. 4", usize::MAX)));
    }
}
