mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

use common::TestWorkspace;

const REQUEST: &str = "\
acc: [CASENO, rd_inv, milepost, SEVERITY, weather]
veh: [CASENO, DRV_SEX, DRV_AGE, vehtype, vehyr, intox]
road: [ROAD_INV, BEGMP, ENDMP, AADT]
curv: [curv_inv, begmp, endmp, deg_curv]
grad: [grad_inv, begmp, endmp, dir_grad, pct_grad]
";

fn seed_sources(ws: &TestWorkspace) {
    ws.write(
        "raw/wa17acc.csv",
        "CASENO,rd_inv,milepost,SEVERITY,CITY\n1,100,0.5,2,Tacoma\n2,100,5.0,1,\n3,200,1.0,3,Yakima\n",
    );
    ws.write(
        "raw/wa16acc.csv",
        "caseno,RD_INV,Milepost,severity,city\n10,100,0.2,1,Olympia\n11,300,2.0,2,\n",
    );
    ws.write("reference/wa17acc.csv", "CASENO,Weather\n1,1\n2,2\n3,1\n");
    ws.write("reference/wa16acc.csv", "CASENO,weather\n10,3\n11,1\n");

    ws.write(
        "raw/wa17veh.csv",
        "CASENO,DRV_SEX,DRV_AGE,vehtype,vehyr,intox\n1,1,30,1,15,0\n2,2,70,6,95,1\n3,1,20,1,10,0\n",
    );
    ws.write(
        "raw/wa16veh.csv",
        "CASENO,DRV_SEX,DRV_AGE,vehtype,vehyr,intox\n10,1,40,1,10,0\n11,1,40,1,10,0\n",
    );
    ws.write(
        "raw/wa17road.csv",
        "ROAD_INV,BEGMP,ENDMP,AADT,COUNTY\n100,0,3,5000,17\n200,0,2,800,39\n",
    );
    ws.write(
        "raw/wa16road.csv",
        "ROAD_INV,BEGMP,ENDMP,AADT,COUNTY\n100,0,1,4000,17\n",
    );
    ws.write(
        "raw/wa17curv.csv",
        "curv_inv,begmp,endmp,seg_lng,deg_curv\n100,0,1,1,3.5\n100,0.4,0.6,0.2,7.0\n",
    );
    ws.write(
        "raw/wa16curv.csv",
        "curv_inv,begmp,endmp,seg_lng,deg_curv\n300,1,3,2,1.5\n",
    );
    ws.write(
        "raw/wa17grad.csv",
        "grad_inv,begmp,endmp,dir_grad,pct_grad\n100,4,6,+,2.5\n",
    );
    ws.write("raw/wa16grad.csv", "grad_inv,begmp,endmp,dir_grad,pct_grad\n");
}

fn write_config(ws: &TestWorkspace, request: &str) -> String {
    ws.write("request.yaml", request);
    let root = ws.path();
    let config = format!(
        "years: [2016, 2017]\n\
         reference_year: 2017\n\
         paths:\n  \
           raw_dir: {:?}\n  \
           reference_dir: {:?}\n  \
           normalized_dir: {:?}\n  \
           reconciled_dir: {:?}\n  \
           merged_dir: {:?}\n  \
           request: {:?}\n\
         reconcile:\n  \
           categories: [acc, veh, road, curv, grad]\n",
        root.join("raw"),
        root.join("reference"),
        root.join("normalized"),
        root.join("reconciled"),
        root.join("merged"),
        root.join("request.yaml"),
    );
    ws.write("pipeline.yaml", &config)
        .to_str()
        .expect("utf-8 path")
        .to_string()
}

fn lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn run_writes_reconciled_and_meta_tables() {
    let ws = TestWorkspace::new();
    seed_sources(&ws);
    let config = write_config(&ws, REQUEST);

    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args(["run", "--config", &config, "--summary"])
        .assert()
        .success()
        .stdout(contains("with_vehicles"))
        .stdout(contains("copied"));

    let reconciled = lines(&ws.path().join("reconciled/wa16acc.csv"));
    assert_eq!(
        reconciled,
        vec![
            "CASENO,rd_inv,milepost,SEVERITY,weather",
            "10,100,0.2,1,3",
            "11,300,2.0,2,1",
        ]
    );
    assert!(ws.path().join("reconciled/wa17grad.csv").is_file());

    let merged = lines(&ws.path().join("merged/2017.csv"));
    assert_eq!(
        merged,
        vec![
            "CASENO,rd_inv,milepost,SEVERITY,weather,has_mixed_sex,has_young_driver,has_old_driver,\
             has_truck,has_old_car,has_intoxication,AADT,deg_curv,dir_grad,pct_grad",
            "1,100,0.5,2,1,False,False,False,False,False,False,5000,7.0,0,0",
            "2,100,5.0,1,2,True,False,True,True,True,True,,0,+,2.5",
            "3,200,1.0,3,1,False,True,False,False,False,False,800,0,0,0",
        ]
    );

    let merged_2016 = lines(&ws.path().join("merged/2016.csv"));
    assert_eq!(merged_2016.len(), 3);
    assert_eq!(
        merged_2016[2],
        "11,300,2.0,2,1,False,False,False,False,False,False,,1.5,0,0"
    );
}

#[test]
fn run_takes_directories_from_the_command_line() {
    let ws = TestWorkspace::new();
    seed_sources(&ws);
    let request = ws.write("request.yaml", REQUEST);
    let config = ws.write(
        "years.yaml",
        "years: [2016, 2017]\n\
         reference_year: 2017\n\
         reconcile:\n  \
           categories: [acc, veh, road, curv, grad]\n",
    );
    let path = |name: &str| ws.path().join(name).to_str().expect("utf-8 path").to_string();

    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args([
            "run",
            "--config",
            config.to_str().expect("utf-8 path"),
            "--raw-dir",
            &path("raw"),
            "--reference-dir",
            &path("reference"),
            "--request",
            request.to_str().expect("utf-8 path"),
            "--reconciled-dir",
            &path("csv"),
            "--merged-dir",
            &path("meta"),
        ])
        .assert()
        .success();

    assert!(ws.path().join("csv/wa16acc.csv").is_file());
    let merged = lines(&ws.path().join("meta/2017.csv"));
    assert_eq!(merged.len(), 4);
    assert_eq!(merged[1], "1,100,0.5,2,1,False,False,False,False,False,False,5000,7.0,0,0");
    assert!(!ws.path().join("reconciled").exists());
}

#[test]
fn merge_stage_honours_command_line_overrides() {
    let ws = TestWorkspace::new();
    seed_sources(&ws);
    let config = write_config(&ws, REQUEST);

    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args(["reconcile", "--config", &config])
        .assert()
        .success();

    let output = ws.path().join("meta");
    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args([
            "merge",
            "--config",
            &config,
            "--output-dir",
            output.to_str().expect("utf-8 path"),
            "--tie-break",
            "first",
            "--boolean-format",
            "one-zero",
        ])
        .assert()
        .success();

    let merged = lines(&output.join("2017.csv"));
    assert_eq!(merged[1], "1,100,0.5,2,1,0,0,0,0,0,0,5000,3.5,0,0");
    assert_eq!(merged[3], "3,200,1.0,3,1,0,1,0,0,0,0,800,0,0,0");
}

#[test]
fn unresolved_attribute_fails_the_run() {
    let ws = TestWorkspace::new();
    seed_sources(&ws);
    let request = REQUEST.replace("weather]", "weather, RDSURF]");
    let config = write_config(&ws, &request);

    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args(["run", "--config", &config])
        .assert()
        .failure()
        .stderr(contains("'RDSURF'"))
        .stderr(contains("has no match"));
    assert!(!ws.path().join("merged").exists());
}

#[test]
fn normalize_renames_older_headers() {
    let ws = TestWorkspace::new();
    seed_sources(&ws);
    let config = write_config(&ws, REQUEST);

    Command::cargo_bin("hsis-prep")
        .expect("binary exists")
        .args(["normalize", "--config", &config])
        .assert()
        .success();

    let normalized = lines(&ws.path().join("normalized/wa16acc.csv"));
    assert_eq!(normalized[0], "CASENO,rd_inv,milepost,SEVERITY,CITY");
    assert_eq!(normalized.len(), 3);
}
