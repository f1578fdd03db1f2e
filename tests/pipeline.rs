use approx::assert_abs_diff_eq;
use jointsnvmix::error::ConfigError;
use jointsnvmix::io::jsm::ClassifiedRow;
use jointsnvmix::io::tsv::{tsv_reader, IndexedTable};
use jointsnvmix::progress::{NoProgress, RecordProgress};
use jointsnvmix::runner::{run_classifier, Density, ModelFamily, RunConfig};
use jointsnvmix::somatic::extract_somatics;
use jointsnvmix::train::TrainingConfig;
use jointsnvmix::utils::resource_dir;
use std::path::{Path, PathBuf};

/// site pattern of row `i`: mostly reference, some germline, one somatic site in ten
fn counts_of(i: usize) -> [u32; 4] {
    match i % 10 {
        0..=5 => [40, 0, 39, 1],
        6 | 7 => [20, 20, 19, 21],
        8 => [40, 1, 20, 20],
        _ => [0, 40, 1, 39],
    }
}

const CHROMOSOMES: [(&str, usize); 3] = [("2", 40), ("1", 60), ("10", 20)];

fn write_jcnt(path: &Path) {
    let mut text = String::from("chrom\tposition\tref_base\tnormal_base\ttumour_base\tnormal_counts_a\tnormal_counts_b\ttumour_counts_a\ttumour_counts_b\n");
    for (chrom, len) in CHROMOSOMES.iter() {
        for i in 0..*len {
            let c = counts_of(i);
            text.push_str(&format!(
                "{}\t{}\tA\tG\tG\t{}\t{}\t{}\t{}\n",
                chrom,
                i + 1,
                c[0],
                c[1],
                c[2],
                c[3]
            ));
        }
    }
    std::fs::write(path, text).unwrap();
}

fn write_mcnt(path: &Path) {
    let mut text = String::from("chrom\tposition\tref_base\tnon_ref_base\tnormal_counts_a\tnormal_counts_b\tnormal_counts_other\ttumour_counts_a\ttumour_counts_b\ttumour_counts_other\n");
    for (chrom, len) in CHROMOSOMES.iter() {
        for i in 0..*len {
            let c = counts_of(i);
            text.push_str(&format!(
                "{}\t{}\tA\tG\t{}\t{}\t{}\t{}\t{}\t{}\n",
                chrom,
                i + 1,
                c[0],
                c[1],
                i % 2,
                c[2],
                c[3],
                0
            ));
        }
    }
    std::fs::write(path, text).unwrap();
}

fn priors(name: &str) -> PathBuf {
    resource_dir().join("priors").join(format!("{}.json", name))
}

fn config(family: ModelFamily, counts: &Path, out: &Path) -> RunConfig {
    RunConfig::new(
        family,
        Density::Binomial,
        counts.to_owned(),
        out.to_owned(),
        None,
        None,
        TrainingConfig::new(1000, 1e-6, 0),
        16,
        0,
    )
}

fn read_classified(path: &Path) -> Vec<ClassifiedRow> {
    let mut table: IndexedTable<ClassifiedRow> = IndexedTable::open(path).unwrap();
    let mut rows = Vec::new();
    for name in table.names() {
        let len = table.length(&name).unwrap();
        table
            .for_each_row(&name, 0..len, |_, row| {
                rows.push(row);
                Ok(())
            })
            .unwrap();
    }
    rows
}

fn sidecar(out: &Path, kind: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}.json", out.display(), kind))
}

#[test]
fn joint_train_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let trained = dir.path().join("trained.jsm");
    let loaded = dir.path().join("loaded.jsm");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Joint, &counts, &trained);
    c.priors = Some(priors("joint_binomial"));
    let mut listener = RecordProgress::default();
    assert_eq!(run_classifier(&c, &mut listener).unwrap(), 120);
    assert!(sidecar(&trained, "priors").exists());
    assert!(sidecar(&trained, "params").exists());

    let rows = read_classified(&trained);
    // chromosomes in sorted name order, rows in input order
    let chroms: Vec<&str> = rows.iter().map(|r| r.chrom.as_str()).collect();
    assert_eq!(chroms[0], "1");
    assert_eq!(chroms[60], "10");
    assert_eq!(chroms[80], "2");
    for (i, row) in rows[..60].iter().enumerate() {
        assert_eq!(row.position, i as u64 + 1);
        assert_abs_diff_eq!(row.probs().iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
    assert!(rows[8].somatic_prob() > 0.9);
    assert!(rows[0].p_aa_aa > 0.9);
    assert!(rows[9].p_bb_bb > 0.9);

    let mut c = config(ModelFamily::Joint, &counts, &loaded);
    c.params = Some(sidecar(&trained, "params"));
    run_classifier(&c, &mut NoProgress).unwrap();
    // loaded parameters are persisted again
    assert!(sidecar(&loaded, "params").exists());
    assert!(!sidecar(&loaded, "priors").exists());
    for (a, b) in rows.iter().zip(read_classified(&loaded).iter()) {
        assert_eq!(a.position, b.position);
        assert_abs_diff_eq!(a.somatic_prob(), b.somatic_prob(), epsilon = 1e-9);
    }
}

#[test]
fn independent_models_are_combined() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let out = dir.path().join("out.jsm");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Independent, &counts, &out);
    c.priors = Some(priors("independent_binomial"));
    c.training.subsample_size = 50;
    run_classifier(&c, &mut NoProgress).unwrap();

    let params = std::fs::read_to_string(sidecar(&out, "params")).unwrap();
    assert!(params.contains("\"independent\""));
    let rows = read_classified(&out);
    assert_eq!(rows.len(), 120);
    for row in rows.iter() {
        assert_abs_diff_eq!(row.probs().iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
    assert!(rows[8].somatic_prob() > 0.9);
}

#[test]
fn per_chromosome_models() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let out = dir.path().join("out.jsm");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Chromosome, &counts, &out);
    c.priors = Some(priors("joint_binomial"));
    let mut listener = RecordProgress::default();
    run_classifier(&c, &mut listener).unwrap();

    let params: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(sidecar(&out, "params")).unwrap()).unwrap();
    assert_eq!(params["layout"], "per_chromosome");
    let names: Vec<&String> = params["chromosomes"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["1", "10", "2"]);
    // training progress of every chromosome
    let trained = listener
        .events
        .iter()
        .filter(|e| e.starts_with("ModelTrained"))
        .count();
    assert_eq!(trained, 3);
    assert_eq!(read_classified(&out).len(), 120);
}

#[test]
fn loaded_parameters_must_match_the_family() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let joint = dir.path().join("joint.jsm");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Joint, &counts, &joint);
    c.priors = Some(priors("joint_binomial"));
    run_classifier(&c, &mut NoProgress).unwrap();

    let mut c = config(ModelFamily::Chromosome, &counts, &dir.path().join("chrom.jsm"));
    c.params = Some(sidecar(&joint, "params"));
    let err = run_classifier(&c, &mut NoProgress).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::ParameterLayout { .. })
    ));
    assert!(!dir.path().join("chrom.jsm").exists());
}

#[test]
fn missing_model_source_fails_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(
        ModelFamily::Joint,
        &dir.path().join("missing.jcnt"),
        &dir.path().join("out.jsm"),
    );
    let err = run_classifier(&c, &mut NoProgress).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
    assert!(!dir.path().join("out.jsm").exists());
}

#[test]
fn multinomial_joint_model() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.mcnt");
    let out = dir.path().join("out.jmm");
    write_mcnt(&counts);

    let mut c = config(ModelFamily::Joint, &counts, &out);
    c.density = Density::Multinomial;
    c.priors = Some(priors("joint_multinomial"));
    assert_eq!(run_classifier(&c, &mut NoProgress).unwrap(), 120);

    let mut reader = tsv_reader(&out).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header[3], "non_ref_base");
    assert_eq!(header[10], "p_aa_aa");
    assert_eq!(header.len(), 19);
    assert_eq!(reader.records().count(), 120);
}

#[test]
fn beta_binomial_joint_and_independent_models() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let joint = dir.path().join("joint.jsm");
    let independent = dir.path().join("independent.jsm");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Joint, &counts, &joint);
    c.density = Density::BetaBinomial;
    c.priors = Some(priors("joint_beta_binomial"));
    assert_eq!(run_classifier(&c, &mut NoProgress).unwrap(), 120);
    let params = std::fs::read_to_string(sidecar(&joint, "params")).unwrap();
    assert!(params.contains("\"shape\""));
    let rows = read_classified(&joint);
    assert!(rows[8].somatic_prob() > 0.9);
    assert!(rows[0].p_aa_aa > 0.9);
    assert!(rows[9].p_bb_bb > 0.9);

    let mut c = config(ModelFamily::Independent, &counts, &independent);
    c.density = Density::BetaBinomial;
    c.priors = Some(priors("independent_beta_binomial"));
    assert_eq!(run_classifier(&c, &mut NoProgress).unwrap(), 120);
    let rows = read_classified(&independent);
    assert!(rows[8].somatic_prob() > 0.5);
    assert!(rows[0].p_aa_aa > 0.9);

    // beta-binomial parameters cannot drive the binomial model
    let mut c = config(ModelFamily::Joint, &counts, &dir.path().join("x.jsm"));
    c.params = Some(sidecar(&joint, "params"));
    assert!(run_classifier(&c, &mut NoProgress).is_err());
}

#[test]
fn fisher_labels() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let out = dir.path().join("out.tsv");
    write_jcnt(&counts);

    let c = config(ModelFamily::Fisher, &counts, &out);
    assert_eq!(run_classifier(&c, &mut NoProgress).unwrap(), 120);
    let mut reader = tsv_reader(&out).unwrap();
    let labels: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[9].to_owned())
        .collect();
    assert_eq!(
        &labels[..10],
        &[
            "Reference",
            "Reference",
            "Reference",
            "Reference",
            "Reference",
            "Reference",
            "Germline",
            "Germline",
            "Somatic",
            "Germline"
        ]
    );
}

#[test]
fn somatic_calls_of_a_classified_table() {
    let dir = tempfile::tempdir().unwrap();
    let counts = dir.path().join("sample.jcnt");
    let jsm = dir.path().join("out.jsm");
    let calls = dir.path().join("out.somatic.tsv");
    write_jcnt(&counts);

    let mut c = config(ModelFamily::Joint, &counts, &jsm);
    c.priors = Some(priors("joint_binomial"));
    run_classifier(&c, &mut NoProgress).unwrap();

    let n = extract_somatics(&jsm, &calls, &["10".to_owned()], &mut NoProgress).unwrap();
    assert!(n > 0);
    let mut reader = tsv_reader(&calls).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), n);
    assert!(rows.iter().all(|r| &r[0] != "10"));
    let scores: Vec<f64> = rows.iter().map(|r| r[9].parse().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // the best call is a somatic site (position 9, 19, ...)
    assert_eq!(rows[0][1].parse::<u64>().unwrap() % 10, 9);
    assert!(scores[0] > 0.9);
}
