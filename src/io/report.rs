//! Reading the multi-table `RESULTS.CSV` report ChemStation writes after
//! integration and library search.
//!
//! The report is a loose sequence of CSV lines. A line starting with `Header=`
//! opens a table whose columns follow the sentinel, and the lines labeled
//! `1=`, `2=`, ... that come right after it are the table's rows. Everything
//! else is kept as meta lines.

mod reader;
mod rows;
mod schema;
mod stack;

pub use reader::{
    is_body_row, is_header_row, parse_report, parse_report_path, ReportError, ReportParser,
    ReportParserState, ReportTable, ReportTables, HEADER_SENTINEL,
};
pub use rows::{FidRow, LibraryRow, PeakRow, ReportRow, ReportRows, RowCells};
pub use schema::{
    SchemaRegistry, TableKind, TableSchema, FID_INTEGRATION_COLUMNS, LIBRARY_MATCH_COLUMNS,
    PEAK_INTEGRATION_COLUMNS,
};
pub use stack::{stack_rows, Keyed, KeyedTables};

#[cfg(test)]
mod test {
    use super::*;

    const REPORT: &str = "\
Sample Name=,FA01
Operator=,lab
Header=,Peak,R.T.,First,Max,Last,PK  TY,Height,Area,Pct Max,Pct Total
1=,1,1.002,10,12,15,BB,5000,120000,100.0,60.0
2=,2,2.503,40,44,50,BV,2500,80000,66.7,40.0

Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual
1=,1,1.010,60.0,Methanol,12,000067-56-1,91
2=,2,5.000,40.0,Toluene,1021,000108-88-3,94
Footer=,end
";

    #[test_log::test]
    fn test_parse_report() -> Result<(), ReportError> {
        let tables = parse_report(REPORT.as_bytes(), &SchemaRegistry::default())?;
        assert_eq!(tables.len(), 2);
        assert_eq!(tables.meta.len(), 3);
        assert_eq!(tables.meta[2], vec!["Footer=", "end"]);

        let peaks = tables.rows::<PeakRow>();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].rt, 1.002);
        assert_eq!(peaks[1].area, 80000.0);
        assert_eq!(peaks[1].peak_type, "BV");
        assert_eq!(peaks[0].block, 0);

        let library = tables.rows::<LibraryRow>();
        assert_eq!(library.len(), 2);
        assert_eq!(library[1].library_id, "Toluene");
        assert_eq!(library[1].block, 1);

        assert!(tables.rows::<FidRow>().is_empty());
        assert_eq!(tables.get_by_name("lib").map(|t| t.name()), Some("lib"));
        Ok(())
    }

    #[test_log::test]
    fn test_no_tables() -> Result<(), ReportError> {
        let text = "a,b\n\n  c , d \n1=,2\n";
        let tables = parse_report(text.as_bytes(), &SchemaRegistry::default())?;
        assert!(tables.is_empty());
        assert_eq!(
            tables.meta,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string()],
                vec!["1=".to_string(), "2".to_string()],
            ]
        );
        Ok(())
    }

    #[test_log::test]
    fn test_empty_table_and_redispatch() -> Result<(), ReportError> {
        let text = "\
Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual
Header=,Peak,R.T.,First,Max,Last,PK  TY,Height,Area,Pct Max,Pct Total
1=,1,1.0,1,2,3,BB,10,100,100,100
";
        let tables = parse_report(text.as_bytes(), &SchemaRegistry::default())?;
        assert_eq!(tables.len(), 2);
        assert!(tables.get(TableKind::LibraryMatch).unwrap().is_empty());
        assert_eq!(tables.rows::<PeakRow>().len(), 1);
        assert_eq!(tables.rows::<PeakRow>()[0].block, 1);
        assert!(tables.meta.is_empty());
        Ok(())
    }

    #[test_log::test]
    fn test_repeated_tables_concatenate() -> Result<(), ReportError> {
        let text = "\
Header=,Peak,R.T.,Start,End,PK TY,Height,Area,Pct Max,Pct Total
1=,1,1.0,0.9,1.1,BB,10,100,100,50
note
Header=,Peak,R.T.,Start,End,PK TY,Height,Area,Pct Max,Pct Total
1=,2,2.0,1.9,2.1,BB,10,100,100,50
";
        let tables = parse_report(text.as_bytes(), &SchemaRegistry::default())?;
        let fid = tables.get(TableKind::FidIntegration).unwrap();
        assert_eq!(fid.blocks, 2);
        let rows = tables.rows::<FidRow>();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].block, rows[1].block), (0, 1));
        assert_eq!(rows[1].peak, 2);
        assert_eq!(tables.meta, vec![vec!["note".to_string()]]);
        Ok(())
    }

    #[test_log::test]
    fn test_report_errors() {
        let text = "x\nHeader=,Peak,Mystery\n1=,1,2\n";
        match parse_report(text.as_bytes(), &SchemaRegistry::default()) {
            Err(ReportError::UnknownTableSchema { line, columns }) => {
                assert_eq!(line, 2);
                assert_eq!(columns, vec!["Header=", "Peak", "Mystery"]);
            }
            other => panic!("Expected an unknown schema, got {other:?}"),
        }

        let text = "Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual\n1=,1,early,1,X,1,1,1\n";
        match parse_report(text.as_bytes(), &SchemaRegistry::default()) {
            Err(ReportError::InvalidValue { line, column, text }) => {
                assert_eq!(line, 2);
                assert_eq!(column, "RT");
                assert_eq!(text, "early");
            }
            other => panic!("Expected an invalid value, got {other:?}"),
        }

        let text = "Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual\n1=,1,1.0\n";
        assert!(matches!(
            parse_report(text.as_bytes(), &SchemaRegistry::default()),
            Err(ReportError::MissingColumns {
                line: 2,
                expected: 8,
                found: 3
            })
        ));
    }

    #[test_log::test]
    fn test_parser_states() -> Result<(), ReportError> {
        let registry = SchemaRegistry::default();
        let mut parser = ReportParser::new(&registry);
        assert_eq!(parser.state(), ReportParserState::Seek);
        let header = LIBRARY_MATCH_COLUMNS.iter().map(|s| s.to_string()).collect();
        parser.handle_row(1, header)?;
        assert_eq!(parser.state(), ReportParserState::Collect);
        parser.handle_row(2, vec!["trailer".to_string()])?;
        assert_eq!(parser.state(), ReportParserState::Seek);
        let tables = parser.finish()?;
        assert_eq!(tables.len(), 1);
        assert_eq!(tables.meta.len(), 1);
        Ok(())
    }
}
