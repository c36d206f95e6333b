use chrono::NaiveDateTime;
use hourgrid_core::{
    FieldSpec, FieldValue, FillState, ImputedGrid, Observation, OutageWindow, Pipeline,
    PipelineOptions, Provenance, Schema,
};

fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn schema() -> Schema {
    Schema::new(vec![
        FieldSpec::numeric("temp"),
        FieldSpec::numeric("clouds_all"),
        FieldSpec::categorical("weather_main"),
    ])
    .unwrap()
}

fn run(raw: Vec<Observation>, start: &str, end: &str) -> ImputedGrid {
    let options = PipelineOptions {
        outage_window: Some(OutageWindow::new(ts(start), ts(end)).unwrap()),
        ..PipelineOptions::default()
    };
    Pipeline::new(schema(), options).unwrap().run(raw).unwrap()
}

fn value_at(imputed: &ImputedGrid, text: &str, field: usize) -> Option<FieldValue> {
    let grid = imputed.grid();
    grid.cell(grid.index_of(ts(text)).unwrap(), field).value().cloned()
}

#[test]
fn gap_after_window_start_uses_mean_of_two_preceding_values() {
    let raw = vec![
        Observation::new(
            ts("2012-10-02 09:00:00"),
            vec![Some(288.28.into()), Some(40.0.into()), Some("Clouds".into())],
        ),
        Observation::new(
            ts("2012-10-02 10:00:00"),
            vec![Some(289.36.into()), Some(75.0.into()), Some("Clouds".into())],
        ),
        Observation::new(
            ts("2012-10-02 12:00:00"),
            vec![Some(290.13.into()), Some(20.0.into()), Some("Clear".into())],
        ),
    ];

    let imputed = run(raw, "2012-10-02 09:00:00", "2013-10-02 10:00:00");
    let temp = value_at(&imputed, "2012-10-02 11:00:00", 0)
        .and_then(|value| value.as_numeric())
        .unwrap();
    assert!((temp - (288.28 + 289.36) / 2.0).abs() < 1e-9);
    assert_eq!(
        value_at(&imputed, "2012-10-02 11:00:00", 1),
        Some(FieldValue::Numeric(57.5))
    );
    assert_eq!(
        value_at(&imputed, "2012-10-02 11:00:00", 2),
        Some(FieldValue::from("Clouds"))
    );

    let grid = imputed.grid();
    let index = grid.index_of(ts("2012-10-02 11:00:00")).unwrap();
    assert_eq!(
        grid.cell(index, 0).state(),
        FillState::Resolved(Provenance::ShortHorizon)
    );
    assert_eq!(imputed.summary().short_horizon, 3);
}

#[test]
fn long_outage_is_filled_without_changing_cardinality() {
    let mut raw: Vec<Observation> = (0..4)
        .map(|hour| {
            Observation::new(
                ts(&format!("2014-08-08 0{hour}:00:00")),
                vec![
                    Some(FieldValue::Numeric(f64::from(hour))),
                    Some(FieldValue::Numeric(90.0)),
                    Some("Rain".into()),
                ],
            )
        })
        .collect();
    raw.push(Observation::new(
        ts("2014-09-08 04:00:00"),
        vec![Some(1.0.into()), Some(1.0.into()), Some("Clear".into())],
    ));

    let imputed = run(raw, "2014-08-08 04:00:00", "2014-09-08 03:00:00");
    let expected_slots = 31 * 24 + 5;
    assert_eq!(imputed.grid().len(), expected_slots);
    assert_eq!(imputed.summary().total(), expected_slots * 3);
    assert_eq!(imputed.summary().unresolved, 0);

    // mean(2, 3) then mean(3, 2.5): each fill feeds the next one.
    assert_eq!(
        value_at(&imputed, "2014-08-08 04:00:00", 0),
        Some(FieldValue::Numeric(2.5))
    );
    assert_eq!(
        value_at(&imputed, "2014-08-08 05:00:00", 0),
        Some(FieldValue::Numeric(2.75))
    );
    assert_eq!(
        value_at(&imputed, "2014-09-01 00:00:00", 2),
        Some(FieldValue::from("Rain"))
    );
    imputed.into_complete().unwrap();
}

#[test]
fn window_locality_holds_for_every_filled_slot() {
    let raw = vec![
        Observation::new(
            ts("2013-03-01 00:00:00"),
            vec![Some(4.0.into()), Some(10.0.into()), Some("Mist".into())],
        ),
        Observation::new(
            ts("2013-03-01 01:00:00"),
            vec![Some(8.0.into()), None, Some("Mist".into())],
        ),
        Observation::new(
            ts("2013-03-01 04:00:00"),
            vec![None, Some(30.0.into()), None],
        ),
        Observation::new(
            ts("2013-03-01 08:00:00"),
            vec![Some(1.0.into()), Some(1.0.into()), Some("Haze".into())],
        ),
    ];

    let imputed = run(raw, "2013-03-01 01:00:00", "2013-03-01 07:00:00");
    let grid = imputed.grid();
    for field in 0..2 {
        let mut known: Vec<f64> = Vec::new();
        for index in 0..grid.len() {
            let cell = grid.cell(index, field);
            let value = cell.value().and_then(FieldValue::as_numeric).unwrap();
            if cell.state() == FillState::Resolved(Provenance::ShortHorizon) {
                let expected = match known.as_slice() {
                    [.., older, latest] => (older + latest) / 2.0,
                    [latest] => *latest,
                    [] => unreachable!("short-horizon fill without history"),
                };
                assert_eq!(value, expected, "field {field} slot {index}");
            }
            known.push(value);
        }
    }
}
