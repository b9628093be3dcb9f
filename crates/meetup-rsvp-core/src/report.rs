//! Text report rendering.
//!
//! Everything here is a pure function of the run's events, summary and issue
//! lists, written to any [`io::Write`] so the output can be checked in tests.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Event, RsvpStatus, Summary};
use crate::utils::{format_count, percentage, truncate_description};

const WIDE_RULE: usize = 80;
const SECTION_RULE: usize = 60;
const EVENT_RULE: usize = 50;
const TOP_GROUPS: usize = 10;
const TOP_EVENTS: usize = 5;
const DESCRIPTION_LIMIT: usize = 150;

/// Everything a report is built from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub events: &'a [Event],
    pub summary: &'a Summary,
    pub errors: &'a [String],
    pub warnings: &'a [String],
    pub generated_at: DateTime<Utc>,
}

/// Machine-readable form printed by `--json`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub summary: &'a Summary,
    pub events: &'a [Event],
    pub errors: &'a [String],
    pub warnings: &'a [String],
}

impl<'a> From<&ReportInput<'a>> for JsonReport<'a> {
    fn from(input: &ReportInput<'a>) -> Self {
        Self {
            summary: input.summary,
            events: input.events,
            errors: input.errors,
            warnings: input.warnings,
        }
    }
}

pub fn render_json<W: Write>(out: &mut W, input: &ReportInput<'_>) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, &JsonReport::from(input))?;
    writeln!(out)
}

pub fn render_report<W: Write>(out: &mut W, input: &ReportInput<'_>) -> io::Result<()> {
    write_header(out, input.generated_at)?;
    write_summary(out, input.summary)?;
    write_events(out, input.events)?;
    write_top_events(out, input.events)?;
    write_issues(out, input.errors, input.warnings)?;
    write_footer(out, input.errors, input.warnings)
}

fn rule(c: char, width: usize) -> String {
    c.to_string().repeat(width)
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", rule('─', SECTION_RULE))?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", rule('─', SECTION_RULE))
}

fn write_header<W: Write>(out: &mut W, generated_at: DateTime<Utc>) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", rule('=', WIDE_RULE))?;
    writeln!(out, "MEETUP RSVP FETCHER - COMPREHENSIVE REPORT")?;
    writeln!(out, "{}", rule('=', WIDE_RULE))?;
    writeln!(
        out,
        "Generated on: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "{}", rule('=', WIDE_RULE))
}

fn write_summary<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    section(out, "📊 SUMMARY STATISTICS")?;

    writeln!(out)?;
    writeln!(out, "📅 Total Events: {}", format_count(summary.total_events))?;
    writeln!(out, "👥 Total RSVPs: {}", format_count(summary.total_rsvps))?;

    let (start, end) = summary.date_range;
    writeln!(
        out,
        "📆 Date Range: {} to {}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )?;
    writeln!(out, "⏱️  Duration: {} days", (end - start).num_days())?;

    writeln!(out)?;
    writeln!(out, "📈 RSVP Breakdown:")?;
    if summary.total_rsvps > 0 {
        writeln!(
            out,
            "  ✅ Yes: {} ({:.1}%)",
            format_count(summary.count(RsvpStatus::Yes)),
            summary.yes_percentage()
        )?;
        writeln!(
            out,
            "  ❌ No: {} ({:.1}%)",
            format_count(summary.count(RsvpStatus::No)),
            summary.no_percentage()
        )?;
        writeln!(
            out,
            "  ⏳ Waitlist: {} ({:.1}%)",
            format_count(summary.count(RsvpStatus::Waitlist)),
            summary.waitlist_percentage()
        )?;
        if let Some(rate) = summary.attendance_rate() {
            writeln!(out, "  📊 Attendance Rate: {:.1}%", rate)?;
        }
    } else {
        writeln!(out, "  No RSVP data available")?;
    }

    if !summary.events_by_group.is_empty() {
        writeln!(out)?;
        writeln!(out, "🏢 Events by Group:")?;
        let groups = summary.groups_by_event_count();
        for (i, (name, count)) in groups.iter().take(TOP_GROUPS).enumerate() {
            writeln!(out, "  {:2}. {}: {} events", i + 1, name, count)?;
        }
        if groups.len() > TOP_GROUPS {
            writeln!(out, "      ... and {} more groups", groups.len() - TOP_GROUPS)?;
        }
    }

    if summary.total_events > 0 {
        writeln!(out)?;
        writeln!(
            out,
            "📊 Average RSVPs per Event: {:.1}",
            summary.total_rsvps as f64 / summary.total_events as f64
        )?;
        if !summary.events_by_group.is_empty() {
            writeln!(
                out,
                "📊 Average Events per Group: {:.1}",
                summary.total_events as f64 / summary.events_by_group.len() as f64
            )?;
        }
    }
    Ok(())
}

fn write_events<W: Write>(out: &mut W, events: &[Event]) -> io::Result<()> {
    if events.is_empty() {
        writeln!(out)?;
        return writeln!(out, "📭 No events to display.");
    }

    section(out, "📅 DETAILED EVENT INFORMATION")?;

    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.date_time());

    for (i, event) in sorted.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{:2}. 📌 {}", i + 1, event.title())?;
        writeln!(out, "     🏢 Group: {}", event.group_name())?;
        writeln!(
            out,
            "     📅 Date: {}",
            event.date_time().format("%Y-%m-%d %H:%M (%A)")
        )?;
        writeln!(out, "     🆔 Event ID: {}", event.id())?;
        match event.venue() {
            Some(venue) => writeln!(out, "     📍 Venue: {}", venue.display_line())?,
            None => writeln!(out, "     📍 Venue: Not specified")?,
        }

        let total = event.total_rsvps();
        if let Some(limit) = event.rsvp_limit().filter(|l| *l > 0) {
            writeln!(
                out,
                "     🎫 RSVP Limit: {} (Utilization: {:.1}%)",
                limit,
                percentage(total, limit as usize)
            )?;
        }

        writeln!(out, "     👥 RSVPs: {} total", total)?;
        if total > 0 {
            writeln!(
                out,
                "       ✅ Yes: {} ({:.1}%)",
                event.yes_rsvps(),
                percentage(event.yes_rsvps(), total)
            )?;
            writeln!(
                out,
                "       ❌ No: {} ({:.1}%)",
                event.no_rsvps(),
                percentage(event.no_rsvps(), total)
            )?;
            writeln!(
                out,
                "       ⏳ Waitlist: {} ({:.1}%)",
                event.waitlist_rsvps(),
                percentage(event.waitlist_rsvps(), total)
            )?;
            writeln!(
                out,
                "       🎉 Total Attendees (with guests): {}",
                event.total_attendees()
            )?;
            if let Some(limit) = event.rsvp_limit().filter(|l| *l > 0) {
                if event.yes_rsvps() > 0 {
                    writeln!(
                        out,
                        "       📊 Capacity Used: {:.1}%",
                        percentage(event.yes_rsvps(), limit as usize)
                    )?;
                }
            }
        } else {
            writeln!(out, "       ℹ️  No RSVP data available")?;
        }

        if !event.description().is_empty() {
            writeln!(
                out,
                "     📝 Description: {}",
                truncate_description(event.description(), DESCRIPTION_LIMIT)
            )?;
        }

        if i + 1 < sorted.len() {
            writeln!(out, "     {}", rule('─', EVENT_RULE))?;
        }
    }
    Ok(())
}

fn write_top_events<W: Write>(out: &mut W, events: &[Event]) -> io::Result<()> {
    let mut ranked: Vec<&Event> = events.iter().filter(|e| e.total_rsvps() > 0).collect();
    if ranked.is_empty() {
        return Ok(());
    }
    // Stable sort keeps input order among ties
    ranked.sort_by(|a, b| b.total_rsvps().cmp(&a.total_rsvps()));

    section(out, "🏆 TOP EVENTS BY RSVP COUNT")?;
    for (i, event) in ranked.iter().take(TOP_EVENTS).enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", i + 1, event.title())?;
        writeln!(out, "   📊 Total RSVPs: {}", event.total_rsvps())?;
        writeln!(
            out,
            "   ✅ Attending: {} ({:.1}%)",
            event.yes_rsvps(),
            percentage(event.yes_rsvps(), event.total_rsvps())
        )?;
        writeln!(
            out,
            "   🎉 Total Attendees (with guests): {}",
            event.total_attendees()
        )?;
        writeln!(out, "   📅 Date: {}", event.date_time().format("%Y-%m-%d %H:%M"))?;
        writeln!(out, "   🏢 Group: {}", event.group_name())?;
    }
    Ok(())
}

fn write_issues<W: Write>(out: &mut W, errors: &[String], warnings: &[String]) -> io::Result<()> {
    if errors.is_empty() && warnings.is_empty() {
        return Ok(());
    }

    section(out, "⚠️  PROCESSING ISSUES SUMMARY")?;

    if !warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "🟡 Warnings ({}):", warnings.len())?;
        for (i, warning) in warnings.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, warning)?;
        }
    }

    if !errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "🔴 Errors ({}):", errors.len())?;
        for (i, error) in errors.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, error)?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "ℹ️  Note: {} errors occurred during processing, but the application",
            errors.len()
        )?;
        writeln!(
            out,
            "   continued to process other data where possible. Check the logs for more details."
        )?;

        writeln!(out)?;
        writeln!(out, "💡 Troubleshooting Tips:")?;
        writeln!(out, "   • Check your API credentials and network connectivity")?;
        writeln!(out, "   • Verify that the events still exist and are accessible")?;
        writeln!(out, "   • Some events may have restricted RSVP data access")?;
        writeln!(out, "   • Rate limiting may cause temporary failures - try again later")?;
    }
    Ok(())
}

fn write_footer<W: Write>(out: &mut W, errors: &[String], warnings: &[String]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", rule('=', WIDE_RULE))?;
    writeln!(out, "REPORT COMPLETED")?;
    writeln!(out, "{}", rule('=', WIDE_RULE))?;

    let total_issues = errors.len() + warnings.len();
    if total_issues == 0 {
        writeln!(out, "✅ Processing completed successfully with no issues.")?;
    } else {
        writeln!(out, "⚠️  Processing completed with {} issues:", total_issues)?;
        if !warnings.is_empty() {
            writeln!(out, "   • {} warnings", warnings.len())?;
        }
        if !errors.is_empty() {
            writeln!(out, "   • {} errors", errors.len())?;
        }
    }
    writeln!(out, "{}", rule('=', WIDE_RULE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventFields, Rsvp, Venue};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 18, 30, 0).unwrap()
    }

    fn event(id: &str, title: &str, day: u32, limit: Option<u32>, rsvps: &[(RsvpStatus, u32)]) -> Event {
        let event = Event::new(EventFields {
            id,
            title,
            description: "",
            date_time: at(day),
            group_name: "Rustaceans",
            group_id: "g1",
            venue: None,
            rsvp_limit: limit,
        })
        .unwrap();
        let rsvps = rsvps
            .iter()
            .enumerate()
            .map(|(i, (status, guests))| {
                Rsvp::new(&format!("m{}", i), "Member", *status, at(1), *guests).unwrap()
            })
            .collect();
        event.with_rsvps(rsvps)
    }

    fn summary_for(events: &[Event]) -> Summary {
        let mut breakdown: BTreeMap<RsvpStatus, usize> =
            RsvpStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for rsvp in events.iter().flat_map(|e| e.rsvps()) {
            *breakdown.entry(rsvp.response()).or_insert(0) += 1;
        }
        Summary {
            total_events: events.len(),
            total_rsvps: events.iter().map(Event::total_rsvps).sum(),
            rsvp_breakdown: breakdown,
            events_by_group: BTreeMap::from([("Rustaceans".to_string(), events.len())]),
            date_range: (at(1), at(11)),
        }
    }

    fn render(events: &[Event], errors: &[String], warnings: &[String]) -> String {
        let summary = summary_for(events);
        let input = ReportInput {
            events,
            summary: &summary,
            errors,
            warnings,
            generated_at: at(20),
        };
        let mut out = Vec::new();
        render_report(&mut out, &input).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_sections_and_totals() {
        use RsvpStatus::*;
        let events = vec![
            event("e2", "Later Event", 11, None, &[]),
            event("e1", "Rust Night", 1, Some(50), &[(Yes, 1), (Yes, 0), (Yes, 0)]),
        ];
        let report = render(&events, &[], &[]);

        assert!(report.contains("MEETUP RSVP FETCHER - COMPREHENSIVE REPORT"));
        assert!(report.contains("Generated on: 2024-05-20 18:30:00 UTC"));
        assert!(report.contains("📅 Total Events: 2"));
        assert!(report.contains("👥 Total RSVPs: 3"));
        assert!(report.contains("📆 Date Range: 2024-05-01 to 2024-05-11"));
        assert!(report.contains("⏱️  Duration: 10 days"));
        assert!(report.contains("  ✅ Yes: 3 (100.0%)"));
        assert!(report.contains("  📊 Attendance Rate: 100.0%"));
        assert!(report.contains("   1. Rustaceans: 2 events"));
        assert!(report.contains("🎫 RSVP Limit: 50 (Utilization: 6.0%)"));
        assert!(report.contains("🎉 Total Attendees (with guests): 4"));
        assert!(report.contains("📍 Venue: Not specified"));
        assert!(report.contains("ℹ️  No RSVP data available"));
        assert!(report.contains("✅ Processing completed successfully with no issues."));
        assert!(!report.contains("PROCESSING ISSUES SUMMARY"));

        // Events are listed by date, not input order
        let first = report.find("📌 Rust Night").unwrap();
        let second = report.find("📌 Later Event").unwrap();
        assert!(first < second);
        assert!(report.contains("(Wednesday)"));
    }

    #[test]
    fn test_top_events_limited_to_five() {
        let events: Vec<Event> = (1..=7)
            .map(|n| {
                let rsvps = vec![(RsvpStatus::Yes, 0); n as usize];
                event(&format!("e{}", n), &format!("Event {}", n), n, None, &rsvps)
            })
            .collect();
        let report = render(&events, &[], &[]);

        let top = &report[report.find("TOP EVENTS BY RSVP COUNT").unwrap()..];
        assert!(top.contains("1. Event 7"));
        assert!(top.contains("5. Event 3"));
        assert!(!top.contains("Event 2\n"));
    }

    #[test]
    fn test_issues_and_footer() {
        let warnings = vec!["RSVP fetching completed with 1 failures out of 3 events".to_string()];
        let errors = vec!["Failed to fetch RSVPs for event e2: boom".to_string()];
        let report = render(&[], &errors, &warnings);

        assert!(report.contains("📭 No events to display."));
        assert!(report.contains("🟡 Warnings (1):"));
        assert!(report.contains("  1. RSVP fetching completed with 1 failures out of 3 events"));
        assert!(report.contains("🔴 Errors (1):"));
        assert!(report.contains("💡 Troubleshooting Tips:"));
        assert!(report.contains("⚠️  Processing completed with 2 issues:"));
        assert!(report.contains("   • 1 warnings"));
        assert!(report.contains("   • 1 errors"));
    }

    #[test]
    fn test_venue_and_description_lines() {
        let venue = Venue::new("Library", "1 Main St", "Austin", "TX").unwrap();
        let long = format!("Doors at six. {}", "x".repeat(300));
        let event = Event::new(EventFields {
            id: "e1",
            title: "Rust Night",
            description: &long,
            date_time: at(1),
            group_name: "Rustaceans",
            group_id: "g1",
            venue: Some(venue),
            rsvp_limit: None,
        })
        .unwrap();
        let report = render(&[event], &[], &[]);

        assert!(report.contains("📍 Venue: Library, 1 Main St, Austin, TX"));
        let line = report
            .lines()
            .find(|l| l.contains("📝 Description:"))
            .unwrap();
        assert!(line.ends_with("..."));
        assert!(line.chars().count() < 200);
    }

    #[test]
    fn test_json_report() {
        let events = vec![event("e1", "Rust Night", 1, Some(50), &[(RsvpStatus::Yes, 2)])];
        let summary = summary_for(&events);
        let input = ReportInput {
            events: &events,
            summary: &summary,
            errors: &[],
            warnings: &[],
            generated_at: at(20),
        };
        let mut out = Vec::new();
        render_json(&mut out, &input).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["summary"]["total_rsvps"], 1);
        assert_eq!(value["summary"]["rsvp_breakdown"]["yes"], 1);
        assert_eq!(value["events"][0]["id"], "e1");
        assert_eq!(value["events"][0]["rsvps"][0]["response"], "yes");
    }
}
