mod parameters;

pub use parameters::{
    Error, Parameter, ParameterMap, ParameterMapIter, ParameterTree, ParameterValue, parse_string,
    parse_table,
};
