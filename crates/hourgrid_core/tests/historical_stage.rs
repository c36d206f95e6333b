use chrono::NaiveDateTime;
use hourgrid_core::{
    FieldSpec, FieldValue, FillState, ImputedGrid, Observation, OutageWindow, Pipeline,
    PipelineError, PipelineOptions, Provenance, Schema, UnresolvedCell,
};

fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn schema() -> Schema {
    Schema::new(vec![
        FieldSpec::numeric("temp"),
        FieldSpec::categorical("weather_main"),
    ])
    .unwrap()
}

fn obs(text: &str, temp: Option<f64>, weather: Option<&str>) -> Observation {
    Observation::new(
        ts(text),
        vec![temp.map(FieldValue::Numeric), weather.map(FieldValue::from)],
    )
}

fn run(raw: Vec<Observation>, options: PipelineOptions) -> ImputedGrid {
    Pipeline::new(schema(), options).unwrap().run(raw).unwrap()
}

fn cell_at(imputed: &ImputedGrid, text: &str, field: usize) -> (Option<FieldValue>, FillState) {
    let grid = imputed.grid();
    let cell = grid.cell(grid.index_of(ts(text)).unwrap(), field);
    (cell.value().cloned(), cell.state())
}

#[test]
fn missing_slot_copies_value_from_one_year_earlier() {
    let raw = vec![
        obs("2013-10-02 09:00:00", Some(281.5), Some("Drizzle")),
        obs("2014-10-02 10:00:00", Some(279.0), Some("Clear")),
    ];

    let imputed = run(raw, PipelineOptions::default());
    assert_eq!(
        cell_at(&imputed, "2014-10-02 09:00:00", 0),
        (
            Some(FieldValue::Numeric(281.5)),
            FillState::Resolved(Provenance::HistoricalYear)
        )
    );
    assert_eq!(
        cell_at(&imputed, "2014-10-02 09:00:00", 1).0,
        Some(FieldValue::from("Drizzle"))
    );
}

#[test]
fn values_copied_earlier_in_the_pass_feed_later_years() {
    let raw = vec![
        obs("2012-01-01 00:00:00", Some(5.0), Some("Snow")),
        obs("2014-01-01 01:00:00", Some(6.0), Some("Snow")),
    ];

    let imputed = run(raw, PipelineOptions::default());
    for text in ["2013-01-01 00:00:00", "2014-01-01 00:00:00"] {
        assert_eq!(
            cell_at(&imputed, text, 0),
            (
                Some(FieldValue::Numeric(5.0)),
                FillState::Resolved(Provenance::HistoricalYear)
            ),
            "slot {text}"
        );
    }
}

#[test]
fn short_horizon_output_is_a_valid_historical_source() {
    let raw = vec![
        obs("2012-06-01 00:00:00", Some(10.0), Some("Clouds")),
        obs("2012-06-01 01:00:00", Some(20.0), Some("Rain")),
        obs("2013-06-01 03:00:00", Some(1.0), Some("Clear")),
    ];
    let options = PipelineOptions {
        outage_window: Some(
            OutageWindow::new(ts("2012-06-01 02:00:00"), ts("2012-06-01 02:00:00")).unwrap(),
        ),
        ..PipelineOptions::default()
    };

    let imputed = run(raw, options);
    assert_eq!(
        cell_at(&imputed, "2012-06-01 02:00:00", 0).1,
        FillState::Resolved(Provenance::ShortHorizon)
    );
    assert_eq!(
        cell_at(&imputed, "2013-06-01 02:00:00", 0),
        (
            Some(FieldValue::Numeric(15.0)),
            FillState::Resolved(Provenance::HistoricalYear)
        )
    );
    assert_eq!(
        cell_at(&imputed, "2013-06-01 02:00:00", 1).0,
        Some(FieldValue::from("Rain"))
    );
}

#[test]
fn fields_resolve_independently_and_gaps_are_reported() {
    let raw = vec![
        obs("2013-05-01 00:00:00", Some(12.0), None),
        obs("2014-05-01 01:00:00", Some(13.0), Some("Clear")),
    ];

    let imputed = run(raw, PipelineOptions::default());
    assert_eq!(
        cell_at(&imputed, "2014-05-01 00:00:00", 0).0,
        Some(FieldValue::Numeric(12.0))
    );
    assert_eq!(
        cell_at(&imputed, "2014-05-01 00:00:00", 1),
        (None, FillState::Unresolved)
    );

    let report = imputed.gap_report();
    assert!(report.cells().contains(&UnresolvedCell {
        timestamp: ts("2014-05-01 00:00:00"),
        field: "weather_main".to_string(),
    }));

    match imputed.into_complete() {
        Err(PipelineError::UnresolvableGaps(gaps)) => assert_eq!(gaps, report),
        other => panic!("expected unresolvable gaps, got {other:?}"),
    }
}
