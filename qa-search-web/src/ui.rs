// -----------------------------------------------------------------------------
// UI markup (inline, served from `/`)
// -----------------------------------------------------------------------------

pub const UI_HTML: &str = r#"<!doctype html>
<html lang="ja">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Q&amp;A Search</title>
  <style>
    body { font-family: system-ui, -apple-system, "Hiragino Sans", "Noto Sans JP", sans-serif; background: #0f172a; color: #e2e8f0; margin: 0; padding: 16px; }
    h1 { margin: 0 0 12px 0; }
    h3 { margin-top: 0; }
    button { background: #0ea5e9; color: #0b1224; border: none; padding: 10px 14px; border-radius: 8px; cursor: pointer; font-weight: 600; }
    button.secondary { background: #334155; color: #e2e8f0; }
    button.danger { background: #ef4444; color: #0b1224; }
    button:disabled { opacity: 0.5; cursor: not-allowed; }
    input, textarea, select { background: #0b1224; color: #e2e8f0; border: 1px solid #334155; border-radius: 8px; padding: 8px; }
    textarea { width: 100%; min-height: 120px; box-sizing: border-box; }
    .card { background: #1e293b; border: 1px solid #334155; border-radius: 12px; padding: 12px; margin-bottom: 12px; }
    .row { display: flex; gap: 12px; flex-wrap: wrap; align-items: center; }
    .tabs button { background: #334155; color: #e2e8f0; }
    .tabs button.active { background: #0ea5e9; color: #0b1224; }
    .badge { padding: 4px 8px; border-radius: 999px; font-weight: 700; }
    .high { background: #22c55e33; color: #22c55e; }
    .mid { background: #eab30833; color: #eab308; }
    .low { background: #ef444433; color: #ef4444; }
    .answer { white-space: pre-wrap; }
    .muted { color: #94a3b8; font-size: 12px; }
    table { width: 100%; border-collapse: collapse; }
    th, td { padding: 8px; text-align: left; border-bottom: 1px solid #334155; vertical-align: top; }
    .hidden { display: none; }
    #status { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; font-size: 12px; }
  </style>
</head>
<body>
  <h1>Q&amp;A Search</h1>
  <div class="card row" id="stats">Loading stats...</div>

  <div class="row tabs" style="margin-bottom:12px">
    <button data-tab="single" class="active">Search</button>
    <button data-tab="batch">Batch</button>
    <button data-tab="history">History</button>
    <button data-tab="data">Data</button>
  </div>

  <section id="tab-single" class="card">
    <h3>Single question</h3>
    <div class="row">
      <input id="query" style="flex:1; min-width:280px" placeholder="Type a question" />
      <label>Top K <input id="topK" type="number" min="1" value="3" style="width:60px" /></label>
      <label>Threshold <input id="threshold" type="number" min="0" max="1" step="0.05" value="0.5" style="width:70px" /></label>
      <button id="searchBtn">Search</button>
    </div>
    <div id="results" style="margin-top:12px"></div>
  </section>

  <section id="tab-batch" class="card hidden">
    <h3>Batch</h3>
    <div class="row" style="margin-bottom:8px">
      <label><input type="radio" name="mode" value="questions" checked /> Question list</label>
      <label><input type="radio" name="mode" value="document" /> Document check</label>
      <label>Threshold <input id="batchThreshold" type="number" min="0" max="1" step="0.05" value="0.5" style="width:70px" /></label>
    </div>
    <textarea id="batchText" placeholder="One question per line (or paste a document)"></textarea>
    <div class="row" style="margin-top:8px">
      <button id="batchBtn">Run on text</button>
      <input type="file" id="batchFile" accept=".txt,.pdf,.docx,.xlsx,.xls,.csv" />
      <input id="batchColumn" placeholder="Column (optional)" />
      <button id="batchFileBtn" class="secondary">Run on file</button>
      <a href="/api/batch/last.csv"><button class="secondary">Download CSV</button></a>
    </div>
    <div id="batchResults" style="margin-top:12px"></div>
  </section>

  <section id="tab-history" class="card hidden">
    <h3>Search history</h3>
    <div class="row" style="margin-bottom:8px">
      <a href="/api/history.csv"><button>Download CSV</button></a>
      <button id="clearHistory" class="secondary">Clear history</button>
    </div>
    <table id="history"></table>
  </section>

  <section id="tab-data" class="card hidden">
    <h3>Data management</h3>
    <div class="row" style="margin-bottom:12px">
      <input type="file" id="uploadFiles" multiple accept=".txt,.pdf,.docx,.xlsx,.xls,.csv" />
      <button id="uploadBtn">Upload &amp; ingest</button>
    </div>
    <div class="row">
      <button id="rebuildBtn" class="secondary">Rebuild from raw data</button>
      <button id="resetBtn" class="danger">Reset store</button>
    </div>
    <pre id="report" class="muted"></pre>
  </section>

  <div class="card"><div id="status">ready</div></div>
<script>
function setStatus(msg) {
  const time = new Date().toLocaleTimeString();
  document.getElementById('status').textContent = `[${time}] ${msg}`;
}

function escapeHtml(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

async function fetchJSON(url, options) {
  const res = await fetch(url, { cache: 'no-store', ...options });
  const body = await res.json().catch(() => ({}));
  if (!res.ok) {
    throw new Error(body.error || `${res.status} ${res.statusText}`);
  }
  return body;
}

function postJSON(url, payload) {
  return fetchJSON(url, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(payload ?? {}),
  });
}

function scoreBadge(score) {
  const pct = (score * 100).toFixed(1);
  const cls = score >= 0.8 ? 'high' : (score >= 0.6 ? 'mid' : 'low');
  return `<span class="badge ${cls}">${pct}%</span>`;
}

function sourceLabel(record) {
  const file = String(record.source_file || '').split(/[\\/]/).pop();
  return record.location ? `${file} - ${record.location}` : file;
}

function renderResult(r) {
  return `<div class="card">
    <div class="row">${scoreBadge(r.similarity_score)} <strong>${escapeHtml(r.record.question)}</strong></div>
    <div class="answer" style="margin-top:8px">${escapeHtml(r.record.answer)}</div>
    <div class="muted" style="margin-top:6px">${escapeHtml(sourceLabel(r.record))}</div>
  </div>`;
}

async function refreshStats() {
  try {
    const s = await fetchJSON('/api/stats');
    document.getElementById('stats').textContent =
      `Entries ${s.total_entries} | Model ${s.model} (${s.dimension}d) | Table ${s.table_name}`;
  } catch (e) {
    document.getElementById('stats').textContent = `stats error: ${e.message}`;
  }
}

async function refreshHistory() {
  const data = await fetchJSON('/api/history');
  const rows = (data.entries || []).slice().reverse().map(h =>
    `<tr><td>${escapeHtml(h.timestamp)}</td><td>${escapeHtml(h.query)}</td><td>${escapeHtml(h.question)}</td><td class="answer">${escapeHtml(h.answer)}</td><td>${scoreBadge(h.similarity_score)}</td></tr>`
  ).join('');
  document.getElementById('history').innerHTML =
    '<tr><th>Time</th><th>Query</th><th>Matched question</th><th>Answer</th><th>Score</th></tr>' + rows;
}

async function search() {
  const query = document.getElementById('query').value;
  const top_k = parseInt(document.getElementById('topK').value, 10);
  const threshold = parseFloat(document.getElementById('threshold').value);
  setStatus('searching...');
  try {
    const data = await postJSON('/api/search', { query, top_k, threshold });
    document.getElementById('results').innerHTML = data.results.length
      ? data.results.map(renderResult).join('')
      : '<div class="muted">No question above the threshold.</div>';
    setStatus(`${data.results.length} result(s)`);
  } catch (e) {
    setStatus(`search error: ${e.message}`);
  }
}

function batchMode() {
  return document.querySelector('input[name="mode"]:checked').value;
}

function renderBatch(data) {
  const rows = data.matches.map(m => {
    const best = m.results[0];
    return best
      ? `<tr><td>${escapeHtml(m.query)}</td><td>${escapeHtml(best.record.question)}</td><td class="answer">${escapeHtml(best.record.answer)}</td><td>${scoreBadge(best.similarity_score)}</td></tr>`
      : `<tr><td>${escapeHtml(m.query)}</td><td colspan="3" class="muted">no match</td></tr>`;
  }).join('');
  document.getElementById('batchResults').innerHTML =
    `<div class="muted">${data.matched} of ${data.matches.length} matched</div><table>` +
    '<tr><th>Input</th><th>Matched question</th><th>Answer</th><th>Score</th></tr>' + rows + '</table>';
}

async function runBatchText() {
  const threshold = parseFloat(document.getElementById('batchThreshold').value);
  setStatus('running batch...');
  try {
    const data = await postJSON('/api/batch', {
      text: document.getElementById('batchText').value,
      mode: batchMode(),
      threshold,
    });
    renderBatch(data);
    setStatus('batch finished');
  } catch (e) {
    setStatus(`batch error: ${e.message}`);
  }
}

async function runBatchFile() {
  const file = document.getElementById('batchFile').files[0];
  if (!file) { setStatus('choose a file first'); return; }
  const form = new FormData();
  form.append('file', file);
  form.append('mode', batchMode());
  form.append('column', document.getElementById('batchColumn').value);
  form.append('threshold', document.getElementById('batchThreshold').value);
  setStatus(`running batch on ${file.name}...`);
  try {
    renderBatch(await fetchJSON('/api/batch/upload', { method: 'POST', body: form }));
    setStatus('batch finished');
  } catch (e) {
    setStatus(`batch error: ${e.message}`);
  }
}

function showReport(report) {
  document.getElementById('report').textContent = JSON.stringify(report, null, 2);
  refreshStats();
}

async function upload() {
  const files = document.getElementById('uploadFiles').files;
  if (!files.length) { setStatus('choose files first'); return; }
  const form = new FormData();
  for (const f of files) form.append('files', f);
  setStatus(`uploading ${files.length} file(s)...`);
  try {
    const report = await fetchJSON('/api/upload', { method: 'POST', body: form });
    showReport(report);
    setStatus(`added ${report.records_added} record(s)`);
  } catch (e) {
    setStatus(`upload error: ${e.message}`);
  }
}

async function rebuild() {
  setStatus('rebuilding...');
  try {
    const report = await postJSON('/api/rebuild');
    showReport(report);
    setStatus(`rebuilt with ${report.records_added} record(s)`);
  } catch (e) {
    setStatus(`rebuild error: ${e.message}`);
  }
}

async function resetStore() {
  if (!confirm('Delete every stored Q&A entry?')) return;
  try {
    showReport(await postJSON('/api/reset'));
    setStatus('store cleared');
  } catch (e) {
    setStatus(`reset error: ${e.message}`);
  }
}

document.querySelectorAll('.tabs button').forEach(btn => btn.addEventListener('click', () => {
  document.querySelectorAll('.tabs button').forEach(b => b.classList.toggle('active', b === btn));
  document.querySelectorAll('section').forEach(s => s.classList.toggle('hidden', s.id !== `tab-${btn.dataset.tab}`));
  if (btn.dataset.tab === 'history') refreshHistory().catch(e => setStatus(`history error: ${e.message}`));
}));

document.getElementById('searchBtn').addEventListener('click', search);
document.getElementById('query').addEventListener('keydown', e => { if (e.key === 'Enter') search(); });
document.getElementById('batchBtn').addEventListener('click', runBatchText);
document.getElementById('batchFileBtn').addEventListener('click', runBatchFile);
document.getElementById('clearHistory').addEventListener('click', async () => {
  await postJSON('/api/history/clear');
  refreshHistory();
});
document.getElementById('uploadBtn').addEventListener('click', upload);
document.getElementById('rebuildBtn').addEventListener('click', rebuild);
document.getElementById('resetBtn').addEventListener('click', resetStore);
refreshStats();
</script>
</body>
</html>"#;
