use crate::config::Grid;
use crate::error::SolverResult;
use crate::solution::Solution;
use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use std::path::Path;

const FILL_VALUE: f64 = -9999.0;

// Fill a (cell, time) variable row by row
fn put_field(
    file: &mut netcdf::FileMut,
    name: &str,
    long_name: &str,
    units: &str,
    field: &DMatrix<f64>,
) -> SolverResult<()> {
    let mut var = file.add_variable::<f64>(name, &["cell", "time"])?;
    var.put_attribute("_FillValue", FILL_VALUE)?;
    var.put_attribute("long_name", long_name)?;
    var.put_attribute("units", units)?;
    var.put_attribute("missing_value", FILL_VALUE)?;
    for i in 0..field.nrows() {
        let row: Vec<f64> = field.row(i).iter().copied().collect();
        var.put_values(&row, (&i, ..))?;
    }
    Ok(())
}

pub fn write_netcdf_output<P: AsRef<Path>>(
    path: P,
    grid: &Grid,
    solution: &Solution,
    reference_time: &NaiveDateTime,
) -> SolverResult<()> {
    let mut file = netcdf::create(path.as_ref())?;

    file.add_dimension("cell", solution.cells())?;
    file.add_dimension("time", solution.samples())?;

    let mut time_var = file.add_variable::<f64>("time", &["time"])?;
    time_var.put_attribute("_FillValue", FILL_VALUE)?;
    time_var.put_attribute("long_name", "valid output time")?;
    time_var.put_attribute("standard_name", "time")?;
    time_var.put_attribute(
        "units",
        format!(
            "seconds since {}",
            reference_time.format("%Y-%m-%d %H:%M:%S")
        ),
    )?;
    time_var.put_attribute("missing_value", FILL_VALUE)?;
    time_var.put_values(&solution.times, ..)?;

    let mut x_var = file.add_variable::<f64>("x", &["cell"])?;
    x_var.put_attribute("long_name", "distance along conduit")?;
    x_var.put_attribute("units", "m")?;
    x_var.put_values(&grid.x, ..)?;

    let mut zb_var = file.add_variable::<f64>("zb", &["cell"])?;
    zb_var.put_attribute("long_name", "bed elevation")?;
    zb_var.put_attribute("units", "m")?;
    zb_var.put_values(&grid.zb, ..)?;

    put_field(&mut file, "area", "channel cross-sectional area", "m2", &solution.area)?;
    put_field(&mut file, "pressure", "water pressure", "Pa", &solution.pressure)?;
    put_field(&mut file, "discharge", "channel discharge", "m3 s-1", &solution.discharge)?;

    let mut lake_var = file.add_variable::<f64>("lake_height", &["time"])?;
    lake_var.put_attribute("_FillValue", FILL_VALUE)?;
    lake_var.put_attribute("long_name", "lake height above inlet")?;
    lake_var.put_attribute("units", "m")?;
    lake_var.put_attribute("missing_value", FILL_VALUE)?;
    lake_var.put_values(solution.lake_height.as_slice(), ..)?;

    file.add_attribute("TITLE", "OUTPUT FROM CONDUIT_RS")?;
    file.add_attribute(
        "file_reference_time",
        reference_time.format("%Y-%m-%d_%H:%M:%S").to_string(),
    )?;
    file.add_attribute("code_version", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
