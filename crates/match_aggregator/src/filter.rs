//! Inbound query → competition/status filter + sort.

use crate::types::Event;

pub const HALF_TIME_STATUS: i64 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Richest markets first
    #[default]
    Markets,
    Time,
    League,
    Home,
}

impl SortMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "markets" => Some(SortMode::Markets),
            "time" => Some(SortMode::Time),
            "league" => Some(SortMode::League),
            "home" => Some(SortMode::Home),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    /// Started, except half-time
    Live,
    HalfTime,
    Upcoming,
}

impl StatusFilter {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(StatusFilter::All),
            "live" => Some(StatusFilter::Live),
            "ht" => Some(StatusFilter::HalfTime),
            "upcoming" => Some(StatusFilter::Upcoming),
            _ => None,
        }
    }

    pub fn matches(self, status: i64) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Live => status > 0 && status != HALF_TIME_STATUS,
            StatusFilter::HalfTime => status == HALF_TIME_STATUS,
            StatusFilter::Upcoming => status == 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub sort: SortMode,
    /// `None` = all competitions
    pub competition: Option<String>,
    pub status: StatusFilter,
    pub include_upcoming: bool,
}

impl EventQuery {
    /// Parses `sort=&competition=&status=&includeUpcoming=`. Unknown values keep the default.
    pub fn from_query(query: &str) -> Self {
        let mut q = EventQuery::default();
        let query = query.trim_start_matches('?');

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "sort" => q.sort = SortMode::parse(value).unwrap_or_default(),
                "status" => q.status = StatusFilter::parse(value).unwrap_or_default(),
                "competition" => {
                    q.competition = (!value.is_empty() && value != "all").then(|| value.to_string());
                }
                "includeUpcoming" => q.include_upcoming = matches!(value, "1" | "true"),
                _ => {}
            }
        }
        q
    }
}

pub fn apply_query(events: Vec<Event>, query: &EventQuery) -> Vec<Event> {
    let mut events: Vec<Event> = events
        .into_iter()
        .filter(|ev| match &query.competition {
            Some(wanted) => ev.competition_id.as_ref().is_some_and(|c| &c.as_key() == wanted),
            None => true,
        })
        .filter(|ev| query.status.matches(ev.status_code()))
        .collect();

    sort_events(&mut events, query.sort);
    events
}

/// All sorts are stable.
pub fn sort_events(events: &mut [Event], mode: SortMode) {
    match mode {
        SortMode::Markets => events.sort_by(|a, b| b.markets.len().cmp(&a.markets.len())),
        SortMode::Time => events.sort_by_key(|ev| ev.kickoff_time.unwrap_or(0)),
        SortMode::League => {
            events.sort_by_key(|ev| ev.competition_id.as_ref().and_then(|c| c.as_i64()).unwrap_or(0))
        }
        SortMode::Home => events.sort_by(|a, b| {
            a.home_team
                .as_deref()
                .unwrap_or("")
                .cmp(b.home_team.as_deref().unwrap_or(""))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Id, Market};

    fn ev(id: i64, status: i64) -> Event {
        Event { id: Some(Id::Num(id)), status: Some(status), ..Default::default() }
    }

    fn ids(events: &[Event]) -> Vec<i64> {
        events.iter().filter_map(|e| e.id.as_ref().and_then(Id::as_i64)).collect()
    }

    #[test]
    fn parses_query_with_fallbacks() {
        let q = EventQuery::from_query("?sort=time&competition=44&status=ht&includeUpcoming=1");
        assert_eq!(q.sort, SortMode::Time);
        assert_eq!(q.competition.as_deref(), Some("44"));
        assert_eq!(q.status, StatusFilter::HalfTime);
        assert!(q.include_upcoming);

        let q = EventQuery::from_query("sort=bogus&competition=all&status=&includeUpcoming=0");
        assert_eq!(q, EventQuery::default());
        assert_eq!(EventQuery::from_query(""), EventQuery::default());
    }

    #[test]
    fn ht_filter_excludes_second_half() {
        let events = vec![ev(1, 1), ev(2, HALF_TIME_STATUS), ev(3, HALF_TIME_STATUS + 1), ev(4, 0)];
        let q = EventQuery { status: StatusFilter::HalfTime, ..Default::default() };
        assert_eq!(ids(&apply_query(events.clone(), &q)), vec![2]);

        let q = EventQuery { status: StatusFilter::Live, sort: SortMode::Time, ..Default::default() };
        assert_eq!(ids(&apply_query(events.clone(), &q)), vec![1, 3]);

        let q = EventQuery { status: StatusFilter::Upcoming, ..Default::default() };
        assert_eq!(ids(&apply_query(events, &q)), vec![4]);
    }

    #[test]
    fn competition_filter_compares_string_form() {
        let mut a = ev(1, 1);
        a.competition_id = Some(Id::Num(44));
        let mut b = ev(2, 1);
        b.competition_id = Some(Id::Text("44".into()));
        let mut c = ev(3, 1);
        c.competition_id = Some(Id::Num(45));

        let q = EventQuery { competition: Some("44".into()), ..Default::default() };
        assert_eq!(ids(&apply_query(vec![a, b, c, ev(4, 1)], &q)), vec![1, 2]);
    }

    #[test]
    fn markets_sort_puts_richer_events_first() {
        let mut small = ev(1, 1);
        small.markets = vec![Market::default(); 3];
        let mut rich = ev(2, 1);
        rich.markets = vec![Market::default(); 7];

        let sorted = apply_query(vec![small, rich], &EventQuery::default());
        assert_eq!(ids(&sorted), vec![2, 1]);
    }

    #[test]
    fn time_league_and_home_sorts() {
        let mut a = ev(1, 1);
        a.kickoff_time = Some(300);
        a.competition_id = Some(Id::Text("9".into()));
        a.home_team = Some("Zenit".into());
        let mut b = ev(2, 1);
        b.kickoff_time = Some(100);
        b.competition_id = Some(Id::Num(10));
        b.home_team = Some("Ajax".into());
        let c = ev(3, 1);

        let mut events = vec![a, b, c];
        sort_events(&mut events, SortMode::Time);
        assert_eq!(ids(&events), vec![3, 2, 1]);
        sort_events(&mut events, SortMode::League);
        assert_eq!(ids(&events), vec![3, 1, 2]);
        sort_events(&mut events, SortMode::Home);
        assert_eq!(ids(&events), vec![3, 2, 1]);
    }
}
