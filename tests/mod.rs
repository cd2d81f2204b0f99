mod smoke_tests;

// This file organizes the integration tests into a cohesive test suite.
// Each module tests a specific aspect of the application:
// - smoke_tests: config loading, date parsing and the authorization flow
// - google_calendar_mock: the sync run against in-memory calendar, page and probe mocks
