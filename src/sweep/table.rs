use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{
    error::TbError,
    model::{Auxiliaries, ModelKind},
    parameters::Parameter,
    state::State,
    sweep::{
        query::{TagQuery, satisfies},
        tag::{Tag, TagKey},
    },
    trajectory::{Trajectory, TrajectorySummary},
};

/// One completed run of a sweep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaggedTrajectory {
    pub tag: Tag,
    pub trajectory: Trajectory,
}

/// One record of the flat export: the tag, the time, and every state and auxiliary field.
#[derive(Debug, Serialize)]
pub struct SweepRow<'a> {
    #[serde(flatten)]
    pub tag: &'a Tag,
    pub time: f64,
    #[serde(flatten)]
    pub state: &'a State,
    #[serde(flatten)]
    pub auxiliaries: &'a Auxiliaries,
}

/// The trajectories of a sweep, each tagged with the parameter values that produced it.
///
/// Tags are unique. Lookup of a complete tag goes through a hash index on the tag values;
/// partial queries scan the runs.
#[derive(Clone, Debug)]
pub struct SweepTable {
    model: ModelKind,
    axes: Vec<Parameter>,
    runs: Vec<TaggedTrajectory>,
    index: FxHashMap<TagKey, usize>,
}

impl SweepTable {
    #[must_use]
    pub fn new(model: ModelKind, axes: Vec<Parameter>) -> Self {
        SweepTable {
            model,
            axes,
            runs: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// The swept parameters, in the order tags list them.
    #[must_use]
    pub fn axes(&self) -> &[Parameter] {
        &self.axes
    }

    pub fn insert(&mut self, tag: Tag, trajectory: Trajectory) -> Result<(), TbError> {
        if !tag.parameters().eq(self.axes.iter().copied()) {
            return Err(TbError::InvalidSweep(format!(
                "tag `{tag}` does not match the sweep axes"
            )));
        }
        let key = tag.key();
        if self.index.contains_key(&key) {
            return Err(TbError::InvalidSweep(format!("duplicate tag `{tag}`")));
        }
        self.index.insert(key, self.runs.len());
        self.runs.push(TaggedTrajectory { tag, trajectory });
        Ok(())
    }

    #[must_use]
    pub fn runs(&self) -> &[TaggedTrajectory] {
        &self.runs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    #[must_use]
    pub fn get(&self, tag: &Tag) -> Option<&Trajectory> {
        self.index.get(&tag.key()).map(|&i| &self.runs[i].trajectory)
    }

    /// Index lookup for constraints that give exactly one value per axis, in any order.
    pub(super) fn lookup(&self, constraints: &[(Parameter, f64)]) -> Option<&TaggedTrajectory> {
        if constraints.len() != self.axes.len() {
            return None;
        }
        let mut values = Vec::with_capacity(self.axes.len());
        for &axis in &self.axes {
            let (_, value) = constraints.iter().find(|(parameter, _)| *parameter == axis)?;
            values.push((axis, *value));
        }
        self.index
            .get(&TagKey::new(values))
            .map(|&i| &self.runs[i])
    }

    /// Every run whose tag agrees with all of the query's constraints.
    pub fn query<Q: TagQuery>(&self, query: Q) -> Vec<&TaggedTrajectory> {
        let constraints = query.constraints();
        if let Some(run) = self.lookup(&constraints) {
            return vec![run];
        }
        self.runs
            .iter()
            .filter(|run| satisfies(run, &constraints))
            .collect()
    }

    /// Per-run summary statistics, in run order.
    #[must_use]
    pub fn summaries(&self) -> Vec<(&Tag, TrajectorySummary)> {
        self.runs
            .iter()
            .filter_map(|run| run.trajectory.summary().map(|summary| (&run.tag, summary)))
            .collect()
    }

    /// One row per time point per run, runs in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = SweepRow<'_>> + '_ {
        self.runs.iter().flat_map(|run| {
            run.trajectory.iter().map(move |point| SweepRow {
                tag: &run.tag,
                time: point.time,
                state: &point.state,
                auxiliaries: &point.auxiliaries,
            })
        })
    }

    fn csv_header(&self) -> Vec<&'static str> {
        let mut header: Vec<&'static str> = self.axes.iter().map(|axis| axis.name()).collect();
        header.push("time");
        header.extend(State::FIELD_NAMES);
        header.extend(Auxiliaries::FIELD_NAMES);
        header
    }

    /// Writes the table as CSV: tag columns, then `time`, the six compartments and the
    /// auxiliaries. Values are printed with enough digits to read back exactly.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TbError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.csv_header())?;
        for row in self.rows() {
            let record = row
                .tag
                .iter()
                .map(|(_, value)| value)
                .chain([row.time])
                .chain(row.state.to_array())
                .chain(row.auxiliaries.to_array())
                .map(|value| value.to_string());
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table as a JSON array of flat records.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), TbError> {
        let rows: Vec<SweepRow<'_>> = self.rows().collect();
        serde_json::to_writer(writer, &rows)?;
        Ok(())
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), TbError> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), TbError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::Model,
        parameters::ParameterSet,
        sweep::{Selection, select},
    };

    fn trajectory(kappa: f64, epsilon: f64) -> Trajectory {
        let parameters = ParameterSet::reference().with_kappa(kappa).with_epsilon(epsilon);
        let model = Model::new(ModelKind::Culling, &parameters).unwrap();
        let states = [
            State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
            State::new(21.0, 0.5, 0.0, 29.0, 0.5, 1.0),
        ];
        Trajectory::from_states(&model, &[0.0, 0.1], &states)
    }

    fn table() -> SweepTable {
        let axes = vec![Parameter::Kappa, Parameter::Epsilon];
        let mut table = SweepTable::new(ModelKind::Culling, axes);
        for kappa in [10.0, 20.0] {
            for epsilon in [0.0, 0.5] {
                let tag = Tag::new(vec![(Parameter::Kappa, kappa), (Parameter::Epsilon, epsilon)]);
                table.insert(tag, trajectory(kappa, epsilon)).unwrap();
            }
        }
        table
    }

    #[test]
    fn rejects_duplicate_and_misshapen_tags() {
        let mut table = table();
        let duplicate = Tag::new(vec![(Parameter::Kappa, 10.0), (Parameter::Epsilon, -0.0)]);
        assert!(matches!(
            table.insert(duplicate, trajectory(10.0, 0.0)),
            Err(TbError::InvalidSweep(_))
        ));
        let reordered = Tag::new(vec![(Parameter::Epsilon, 0.9), (Parameter::Kappa, 10.0)]);
        assert!(table.insert(reordered, trajectory(10.0, 0.9)).is_err());
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn exact_and_partial_queries() {
        let table = table();
        let full = table.query(((Parameter::Epsilon, 0.5), (Parameter::Kappa, 20.0)));
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].tag.get(Parameter::Kappa), Some(20.0));
        assert_eq!(full[0].tag.get(Parameter::Epsilon), Some(0.5));

        assert_eq!(table.query((Parameter::Kappa, 10.0)).len(), 2);
        assert_eq!(table.query(()).len(), 4);
        assert!(table.query((Parameter::Kappa, 15.0)).is_empty());
    }

    #[test]
    fn select_needs_a_complete_selection() {
        let table = table();
        let selection = Selection::new().with(Parameter::Kappa, 20.0).with(Parameter::Epsilon, 0.0);
        let trajectory = select(&table, &selection).unwrap();
        assert_eq!(trajectory.len(), 2);
        assert!(select(&table, &Selection::new().with(Parameter::Kappa, 20.0)).is_none());
        assert!(
            select(&table, &Selection::new().with(Parameter::Kappa, 20.0).with(Parameter::Mu, 0.2))
                .is_none()
        );
    }

    #[test]
    fn csv_export() {
        let table = table();
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("kappa,epsilon,time,sj,ej,ij,sad,ead,iad,juveniles,"));
        assert!(header.ends_with(",total_population"));
        assert_eq!(lines.clone().count(), 8);
        assert!(lines.next().unwrap().starts_with("10,0,0,20,0,0,30,0,1,20,31,"));
    }

    #[test]
    fn json_export_round_trips_values() {
        let table = table();
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("sweep.json");
        table.save_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(records.len(), 8);
        let last = &records[7];
        assert_eq!(last["kappa"], 20.0);
        assert_eq!(last["epsilon"], 0.5);
        assert_eq!(last["time"], 0.1);
        assert_eq!(last["sj"], 21.0);
        let expected = table.runs()[3].trajectory.last().unwrap().auxiliaries.mortality_modifier;
        let parsed = last["mortality_modifier"].as_f64().unwrap();
        assert!((parsed - expected).abs() <= 1e-15 * expected.abs());
    }

    #[test]
    fn csv_columns_match_json_keys() {
        let table = table();
        let mut csv_buffer = Vec::new();
        table.write_csv(&mut csv_buffer).unwrap();
        let csv_text = String::from_utf8(csv_buffer).unwrap();
        let mut columns: Vec<&str> = csv_text.lines().next().unwrap().split(',').collect();

        let mut json_buffer = Vec::new();
        table.write_json(&mut json_buffer).unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_slice(&json_buffer).unwrap();
        let mut keys: Vec<&str> =
            records[0].as_object().unwrap().keys().map(String::as_str).collect();

        columns.sort_unstable();
        keys.sort_unstable();
        assert_eq!(columns, keys);
    }

    #[test]
    fn csv_file_is_written() {
        let table = table();
        let file = tempfile::NamedTempFile::new().unwrap();
        table.save_csv(file.path()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().count(), 9);
    }
}
