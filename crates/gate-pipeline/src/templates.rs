//! Default checklist seeded when a gate is initialized.

use gate_types::{GateNumber, NewChecklistItem};

/// Short stage label used in log lines and views.
pub fn stage_title(gate_number: GateNumber) -> &'static str {
    match gate_number {
        GateNumber::Zero => "Onboarding",
        GateNumber::One => "Development Plan",
        GateNumber::Two => "Mid-Season Review",
        GateNumber::Three => "Season Close-Out",
    }
}

/// Default checklist for a stage, in display order.
pub fn default_checklist(gate_number: GateNumber) -> Vec<NewChecklistItem> {
    let entries: &[(&str, bool)] = match gate_number {
        GateNumber::Zero => &[
            ("Collect player identification documents (ID / Passport)", true),
            ("Obtain signed representation agreement", true),
            ("Complete medical examination", true),
            ("Upload player photo & profile data", false),
        ],
        GateNumber::One => &[
            ("Complete initial performance assessment", true),
            ("Create Individual Development Plan (IDP)", true),
            ("Set short-term performance goals", true),
            ("Record baseline statistics", false),
        ],
        GateNumber::Two => &[
            ("Mid-season performance review", true),
            ("Update market valuation", true),
            ("Review IDP progress & adjust goals", true),
            ("Stakeholder feedback report", false),
        ],
        GateNumber::Three => &[
            ("End-of-season performance evaluation", true),
            ("Contract renewal or transfer recommendation", true),
            ("Next-season development goals agreed", true),
            ("Player feedback interview", false),
        ],
    };

    entries
        .iter()
        .zip(1..)
        .map(|(&(text, mandatory), order)| {
            let item = if mandatory {
                NewChecklistItem::mandatory(text)
            } else {
                NewChecklistItem::optional(text)
            };
            item.with_sort_order(order)
        })
        .collect()
}
