crate::config_group!({

    /// The number of records requested per index page. The service accepts 10 to 100.
    ///
    /// Use the environment variable `CHAINFETCH_ENUMERATION_PAGE_SIZE` to set this value.
    ref page_size: usize = 100;

    /// The record type filter codes; aggregate-complete and aggregate-bonded by default.
    ///
    /// Use the environment variable `CHAINFETCH_ENUMERATION_RECORD_TYPES` (comma separated) to set this value.
    ref record_types: Vec<u16> = vec![16705, 16961];

    /// Page ordering, `asc` or `desc`.
    ref order: String = "desc".to_string();

    /// Retries of a failed index page. Zero makes any failure fatal to the enumeration.
    ref retry_max_attempts: usize = 0;
});
