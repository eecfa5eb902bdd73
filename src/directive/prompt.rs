const LOCATION_ANALYSIS_TEMPLATE: &str = r#"You are a mine surveying assistant. Interpret the drill-hole location description below relative to the surveyed reference points it mentions.

Location description: {location_desc}

Return exactly one JSON object and nothing else, with these keys:
{
  "reference_point": "id of the survey point the position is measured from",
  "direction_type": "forward | backward | between | lateral",
  "distance": 0.0,
  "direction_reference_point": "second survey point giving the direction (forward/backward) or the far end (between)",
  "lateral_offset": {"direction": "left | right", "distance": 0.0},
  "vertical_offset": {"direction": "up | down", "distance": 0.0},
  "confidence": 0.0
}

Rules:
- "forward": the position lies `distance` metres from reference_point towards direction_reference_point.
- "backward": the position lies `distance` metres from reference_point away from direction_reference_point.
- "between": the position lies between the two points; `distance` is measured from reference_point, omit it for the midpoint.
- "lateral": the position is beside reference_point.
- Distances are in metres. Use null for anything the description does not state.
- confidence is your certainty in [0, 1]."#;

pub fn location_analysis_prompt(location_desc: &str) -> String {
    LOCATION_ANALYSIS_TEMPLATE.replace("{location_desc}", location_desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_description_verbatim() {
        let prompt = location_analysis_prompt("XQ15点前方50米");
        assert!(prompt.contains("Location description: XQ15点前方50米\n"));
        assert!(!prompt.contains("{location_desc}"));
    }
}
