/*
 * Project::Augur, epidemiological forecasting and trend analysis in the browser
 * Copyright (C) 2025 Athaariq A. Ramadhani <foss@athaariq.my.id>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

// Every notice carries one of these so the page knows how to render it
pub(crate) const DIALOG_ERROR: &str = "dialog-error";
pub(crate) const DIALOG_WARNING: &str = "dialog-warning";
pub(crate) const DIALOG_INFO: &str = "dialog-info";
pub(crate) const DIALOG_SUCCESS: &str = "dialog-success";

// Emitted once at the end of a forecast or trend action, whatever the outcome
pub(crate) const OPERATION_FINISHED: &str = "operation-finished";
