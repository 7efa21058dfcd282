use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use throughput_report::processor::{ProcessorError, columnar_processor::ColumnarProcessor};
use throughput_report::report::{
    ReportConfig, ReportError, ThroughputRow, build_and_render, build_throughput_table,
};

const HEADER: &str = "name,rs,tm,batch_size,threads,duration,exp_time_in_sec,iterations";

fn write_csv(body: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", body).unwrap();
    tmp
}

fn table_from(body: &str) -> Result<Vec<ThroughputRow>, ReportError> {
    let tmp = write_csv(body);
    let mut processor = ColumnarProcessor::new();
    processor.load_csv(tmp.path()).unwrap();
    build_throughput_table(&processor)
}

fn assert_no_outputs(config: &ReportConfig) {
    assert!(!config.png_path().exists());
    assert!(!config.pdf_path().exists());
}

#[test]
fn test_single_row() {
    let csv = format!("{HEADER}\nX,One,Sequential,1,4,10,10.0,40\n");
    let table = table_from(&csv).unwrap();

    assert_eq!(table.len(), 1);
    let row = &table[0];
    assert_eq!(row.throughput, 4.0);
    assert_eq!(row.configuration, "Bench=X RS=One TM=Sequential BS=1");
    assert_eq!(row.threads, 4);
    assert_eq!(row.iterations, 40);
}

#[test]
fn test_duplicate_rows_sum_iterations_and_max_time() {
    let csv = format!(
        "{HEADER}\n\
         X,One,Sequential,1,4,10,10.0,40\n\
         X,One,Sequential,1,4,10,12.0,60\n"
    );
    let table = table_from(&csv).unwrap();

    assert_eq!(table.len(), 1);
    let row = &table[0];
    assert_eq!(row.iterations, 100);
    assert_eq!(row.exp_time_in_sec, 12.0);
    assert!((row.throughput - 100.0 / 12.0).abs() < 1e-12);
    assert!((row.throughput - 8.333).abs() < 1e-3);
}

#[test]
fn test_k_trials_collapse_into_one_row() {
    let k = 7;
    let mut csv = format!("{HEADER}\n");
    for trial in 1..=k {
        csv.push_str(&format!(
            "hashmap,Socket,Interleave,8,16,5,{}.5,{}\n",
            trial,
            trial * 1000
        ));
    }
    let table = table_from(&csv).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table[0].iterations, (1..=k).map(|t| t * 1000).sum::<i64>());
    assert_eq!(table[0].exp_time_in_sec, k as f64 + 0.5);
    assert_eq!(
        table[0].throughput,
        table[0].iterations as f64 / table[0].exp_time_in_sec
    );
}

#[test]
fn test_group_key_is_unique_and_complete() {
    let csv = format!(
        "{HEADER}\n\
         stack,One,Sequential,1,1,10,10.0,10\n\
         stack,One,Sequential,1,2,10,10.0,20\n\
         stack,One,Sequential,1,2,20,20.0,40\n\
         stack,L1,Sequential,1,2,10,10.0,30\n\
         stack,One,Interleave,8,2,10,10.0,50\n\
         stack,One,Sequential,1,1,10,11.0,15\n"
    );
    let table = table_from(&csv).unwrap();
    assert_eq!(table.len(), 5);

    let mut keys: Vec<(String, String, String, i64, i64, u64)> = table
        .iter()
        .map(|r| {
            (
                r.name.clone(),
                r.rs.clone(),
                r.tm.clone(),
                r.batch_size,
                r.threads,
                r.duration.to_bits(),
            )
        })
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), table.len());

    let one_thread = table
        .iter()
        .find(|r| r.rs == "One" && r.tm == "Sequential" && r.threads == 1)
        .unwrap();
    assert_eq!(one_thread.iterations, 25);
    assert_eq!(one_thread.exp_time_in_sec, 11.0);
}

#[test]
fn test_benchmarks_are_partitioned_by_name() {
    let csv = format!(
        "{HEADER}\n\
         stack,One,Sequential,1,4,10,10.0,40\n\
         hashmap,One,Sequential,1,4,10,10.0,80\n\
         stack,One,Sequential,1,8,10,10.0,60\n"
    );
    let table = table_from(&csv).unwrap();

    let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["stack", "stack", "hashmap"]);
    assert_eq!(table[2].configuration, "Bench=hashmap RS=One TM=Sequential BS=1");
    assert_eq!(table[2].throughput, 8.0);
}

#[test]
fn test_labels_depend_only_on_configuration() {
    let csv = format!(
        "{HEADER}\n\
         X,One,Sequential,8,1,10,10.0,40\n\
         X,One,Sequential,8,2,10,10.0,40\n\
         X,One,Sequential,8,4,20,10.0,40\n\
         X,Socket,Sequential,8,4,10,10.0,40\n"
    );
    let table = table_from(&csv).unwrap();

    let one: Vec<&ThroughputRow> = table.iter().filter(|r| r.rs == "One").collect();
    assert_eq!(one.len(), 3);
    assert!(
        one.iter()
            .all(|r| r.configuration == "Bench=X RS=One TM=Sequential BS=8")
    );
    let socket = table.iter().find(|r| r.rs == "Socket").unwrap();
    assert_ne!(socket.configuration, one[0].configuration);
}

#[test]
fn test_table_is_idempotent() {
    let csv = format!(
        "{HEADER}\n\n\
         b,L1,Interleave,8,16,10,10.5,900\n\
         a,One,Sequential,1,1,10,10.0,100\n\
         \n\
         b,L1,Interleave,8,2,10,10.1,300\n\
         a,One,Sequential,1,1,10,10.2,110\n"
    );
    let first = table_from(&csv).unwrap();
    let second = table_from(&csv).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_zero_time_fails_without_outputs() {
    let csv = write_csv(&format!(
        "{HEADER}\n\
         X,One,Sequential,1,4,10,10.0,40\n\
         X,One,Sequential,1,8,10,0,40\n"
    ));
    let dir = tempfile::tempdir().unwrap();
    let config = ReportConfig::default().with_output_dir(dir.path());

    let err = build_and_render(csv.path(), &config).unwrap_err();
    match err {
        ReportError::ZeroElapsedTime {
            configuration,
            threads,
        } => {
            assert_eq!(configuration, "Bench=X RS=One TM=Sequential BS=1");
            assert_eq!(threads, 8);
        }
        other => panic!("expected ZeroElapsedTime, got {other:?}"),
    }
    assert_no_outputs(&config);
}

#[test]
fn test_missing_column_fails_without_outputs() {
    let csv = write_csv(
        "name,tm,batch_size,threads,duration,exp_time_in_sec,iterations\n\
         X,Sequential,1,4,10,10.0,40\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let config = ReportConfig::default().with_output_dir(dir.path());

    let err = build_and_render(csv.path(), &config).unwrap_err();
    assert!(matches!(
        err,
        ReportError::Processor(ProcessorError::MissingColumn(ref c)) if c == "rs"
    ));
    assert_no_outputs(&config);
}

#[test]
fn test_unreadable_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReportConfig::default().with_output_dir(dir.path());
    let err = build_and_render(&dir.path().join("missing.csv"), &config).unwrap_err();
    assert!(matches!(err, ReportError::Processor(ProcessorError::Io(_))));
}

#[test]
fn test_quoted_csv_and_bom() {
    let csv = "\u{feff}\"name\",\"rs\",\"tm\",\"batch_size\",\"threads\",\"duration\",\"exp_time_in_sec\",\"iterations\"\n\
               \"X\",\"One\",Sequential,1,4,10,10.0,40\n\
               \"X, v2\",One,Sequential,\"1\",4,10,10.0,80\n";
    let table = table_from(csv).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table[0].configuration, "Bench=X RS=One TM=Sequential BS=1");
    assert_eq!(table[0].throughput, 4.0);
    assert_eq!(table[1].name, "X, v2");
    assert_eq!(table[1].configuration, "Bench=X, v2 RS=One TM=Sequential BS=1");
}

#[test]
fn test_render_writes_png_and_pdf() {
    let csv = write_csv(&format!(
        "{HEADER}\n\
         X,One,Sequential,1,1,10,10.0,10000000\n\
         X,One,Sequential,1,2,10,10.0,19000000\n\
         X,Socket,Interleave,8,1,10,10.0,12000000\n\
         X,Socket,Interleave,8,2,10,10.0,25000000\n"
    ));
    let dir = tempfile::tempdir().unwrap();
    let config = ReportConfig::default().with_output_dir(dir.path());
    if let Err(e) = config.theme.check_font() {
        eprintln!("skipping render test: {e}");
        return;
    }

    // stale files from an earlier run are replaced
    std::fs::write(config.png_path(), b"stale").unwrap();
    std::fs::write(config.pdf_path(), b"stale").unwrap();

    let mut previous: Option<Vec<ThroughputRow>> = None;
    for _ in 0..2 {
        let table = build_and_render(csv.path(), &config).unwrap();
        let png = std::fs::read(config.png_path()).unwrap();
        let pdf = std::fs::read(config.pdf_path()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(pdf.starts_with(b"%PDF"));
        if let Some(previous) = &previous {
            assert_eq!(previous, &table);
        }
        previous = Some(table);
    }

    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 2);
    assert!(Path::new(&config.png_path()).ends_with("throughput-log-append.png"));
}
