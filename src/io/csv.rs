use crate::config::Grid;
use crate::error::SolverResult;
use crate::forcing::Series;
use crate::solution::Solution;
use csv::{ReaderBuilder, Writer, WriterBuilder};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

// One row of the long-format results table
#[derive(Debug, Serialize)]
struct ResultRecord {
    step: usize,
    time: f64,
    cell: usize,
    x: f64,
    area: f64,
    pressure: f64,
    discharge: f64,
    lake_height: f64,
}

// Load a two-column table (e.g. `time,discharge` or `height,area`) with a
// header row into an interpolating series.
pub fn load_series<P: AsRef<Path>>(path: P) -> SolverResult<Series> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut x = Vec::new();
    let mut y = Vec::new();
    for result in rdr.deserialize() {
        let (xi, yi): (f64, f64) = result?;
        x.push(xi);
        y.push(yi);
    }

    info!("Loaded {} rows from {}", x.len(), path.display());
    Ok(Series::new(x, y)?)
}

pub fn create_csv_writer<P: AsRef<Path>>(path: P) -> SolverResult<Writer<File>> {
    Ok(WriterBuilder::new().has_headers(true).from_path(path)?)
}

pub fn write_solution<W: Write>(
    wtr: &mut Writer<W>,
    grid: &Grid,
    solution: &Solution,
) -> SolverResult<()> {
    for (step, &time) in solution.times.iter().enumerate() {
        for cell in 0..solution.cells() {
            wtr.serialize(ResultRecord {
                step,
                time,
                cell,
                x: grid.x[cell],
                area: solution.area[(cell, step)],
                pressure: solution.pressure[(cell, step)],
                discharge: solution.discharge[(cell, step)],
                lake_height: solution.lake_height[step],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_solution_csv<P: AsRef<Path>>(
    path: P,
    grid: &Grid,
    solution: &Solution,
) -> SolverResult<()> {
    let mut wtr = create_csv_writer(path)?;
    write_solution(&mut wtr, grid, solution)
}
